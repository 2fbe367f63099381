//! Bearer tokens for the Google APIs.
//!
//! Service-account keys go through the OAuth 2.0 JWT-bearer flow: an RS256
//! assertion signed with the key is exchanged for a short-lived access token,
//! which is cached until shortly before it expires.

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use log::debug;
use log::info;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use crate::config::DriveCredentials;
use crate::storage::error::StorageError;

const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// The fields of a service-account key file this client needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        serde_json::from_str(json).map_err(|e| StorageError::InvalidCredentials {
            message: format!("Malformed service account key: {e}"),
        })
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Exchanges a service-account key for access tokens.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, client: Client) -> Self {
        Self {
            key,
            client,
            cached: Mutex::new(None),
        }
    }

    /// Returns a cached token, fetching a new one when it is close to expiry.
    pub async fn access_token(&self) -> Result<String, StorageError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref()
            && token.is_fresh(now)
        {
            return Ok(token.token.clone());
        }

        let fresh = self.fetch_token(now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, StorageError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: DRIVE_READONLY_SCOPE,
            aud: &self.key.token_uri,
            exp: iat + TOKEN_LIFETIME_SECS,
            iat,
        };

        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&header, &claims, &key)?)
    }

    async fn fetch_token(&self, now: DateTime<Utc>) -> Result<CachedToken, StorageError> {
        let assertion = self.sign_assertion(now)?;
        debug!(
            "Requesting access token for {} from {}",
            self.key.client_email, self.key.token_uri
        );

        // JWTs are base64url segments joined by dots, so the assertion needs no escaping.
        let body = format!("grant_type={JWT_BEARER_GRANT}&assertion={assertion}");
        let response = self
            .client
            .post(self.key.token_uri.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(StorageError::Unauthorized {
                message: format!("token exchange failed ({status}): {text}"),
            });
        }

        let resp: TokenResponse = serde_json::from_str(&text)?;
        let expires_in = resp.expires_in.unwrap_or(TOKEN_LIFETIME_SECS);
        info!("Obtained storage access token valid for {expires_in}s.");

        Ok(CachedToken {
            token: resp.access_token,
            expires_at: now + Duration::seconds(expires_in),
        })
    }
}

/// Source of bearer tokens for storage requests.
pub enum TokenProvider {
    Static(String),
    ServiceAccount(ServiceAccountAuth),
}

impl TokenProvider {
    /// Builds a provider from configured credentials, reading key files eagerly.
    pub fn from_credentials(
        credentials: &DriveCredentials,
        client: Client,
    ) -> Result<Self, StorageError> {
        let key = match credentials {
            DriveCredentials::AccessToken(token) => return Ok(Self::Static(token.clone())),
            DriveCredentials::ServiceAccountJson(json) => ServiceAccountKey::from_json(json)?,
            DriveCredentials::ServiceAccountFile(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    StorageError::InvalidCredentials {
                        message: format!(
                            "Failed to read service account key from {}: {e}",
                            path.display()
                        ),
                    }
                })?;
                ServiceAccountKey::from_json(&json)?
            }
        };
        Ok(Self::ServiceAccount(ServiceAccountAuth::new(key, client)))
    }

    pub async fn access_token(&self) -> Result<String, StorageError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ServiceAccount(auth) => auth.access_token().await,
        }
    }
}
