//! Google Drive v3 storage integration.

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use log::debug;
use log::warn;
use serde_json::Value;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::USER_AGENT;

use crate::config::DriveCredentials;
use crate::model::FileRef;
use crate::storage::Storage;
use crate::storage::error::StorageError;
use crate::storage::google_auth::TokenProvider;

/// Google Drive file listing and download.
pub struct GoogleDriveStorage {
    api_url: String,
    client: Client,
    tokens: TokenProvider,
}

impl GoogleDriveStorage {
    /// Creates a Drive client authenticating with the configured credentials.
    pub fn new(
        api_url: impl Into<String>,
        credentials: &DriveCredentials,
    ) -> Result<Self, StorageError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("alert-relay/0.1"));
        let client = Client::builder().default_headers(headers).build()?;
        let tokens = TokenProvider::from_credentials(credentials, client.clone())?;
        Ok(Self::with_token_provider(api_url, client, tokens))
    }

    pub fn with_token_provider(
        api_url: impl Into<String>,
        client: Client,
        tokens: TokenProvider,
    ) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client,
            tokens,
        }
    }

    /// Builds the `files.list` search expression.
    pub fn build_query(parent_id: &str, name: &str, exclude_trashed: bool) -> String {
        let mut q = format!(
            "'{}' in parents and name = '{}'",
            Self::escape_query_value(parent_id),
            Self::escape_query_value(name)
        );
        if exclude_trashed {
            q.push_str(" and trashed = false");
        }
        q
    }

    fn escape_query_value(value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "\\'")
    }

    fn status_error(status: u16, body: &str, file_id: Option<&str>) -> StorageError {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| body.to_string());

        match (status, file_id) {
            (401 | 403, _) => StorageError::Unauthorized { message },
            (404, Some(file_id)) => StorageError::NotFound {
                file_id: file_id.to_string(),
            },
            _ => StorageError::ApiError { status, message },
        }
    }

    fn get_files_from_resp(resp: &Value) -> Result<&Vec<Value>, StorageError> {
        resp.get("files")
            .and_then(|v| v.as_array())
            .ok_or_else(|| StorageError::MissingField {
                field: "files".to_string(),
            })
    }

    fn parse_file(file: &Value) -> Result<FileRef, StorageError> {
        let get_str = |field: &str| {
            file.get(field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| StorageError::MissingField {
                    field: format!("files[].{field}"),
                })
        };

        let id = get_str("id")?.to_string();
        let name = get_str("name")?.to_string();
        let created_time = match file.get("createdTime").and_then(|v| v.as_str()) {
            Some(time) => match DateTime::parse_from_rfc3339(time) {
                Ok(dt) => Some(dt.with_timezone(&Utc)),
                Err(_) => {
                    warn!("Ignoring unparsable createdTime `{time}` of file {id}");
                    None
                }
            },
            None => None,
        };

        Ok(FileRef {
            id,
            name,
            created_time,
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        file_id: Option<&str>,
    ) -> Result<reqwest::Response, StorageError> {
        let token = self.tokens.access_token().await?;
        let req = request
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .build()?;
        debug!("Making request to: {}", req.url());

        let response = self.client.execute(req).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status.as_u16(), &body, file_id));
        }
        Ok(response)
    }
}

#[async_trait]
impl Storage for GoogleDriveStorage {
    async fn list_files(
        &self,
        parent_id: &str,
        name: &str,
        exclude_trashed: bool,
    ) -> Result<Vec<FileRef>, StorageError> {
        debug!("Listing `{name}` in folder {parent_id}");
        let q = Self::build_query(parent_id, name, exclude_trashed);
        let request = self
            .client
            .get(format!("{}/drive/v3/files", self.api_url))
            .query(&[
                ("q", q.as_str()),
                ("orderBy", "createdTime desc"),
                ("pageSize", "1"),
                ("fields", "files(id,name,createdTime)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ]);

        let body = self.send(request, None).await?.text().await?;
        let resp: Value = serde_json::from_str(&body)?;
        Self::get_files_from_resp(&resp)?
            .iter()
            .map(Self::parse_file)
            .collect()
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        debug!("Downloading file {file_id}");
        let request = self
            .client
            .get(format!("{}/drive/v3/files/{file_id}", self.api_url))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);

        let bytes = self.send(request, Some(file_id)).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_build_query() {
        assert_eq!(
            GoogleDriveStorage::build_query("folder1", "AlertaIAGRO.xlsx", true),
            "'folder1' in parents and name = 'AlertaIAGRO.xlsx' and trashed = false"
        );
        assert_eq!(
            GoogleDriveStorage::build_query("f", "it's\\here", false),
            "'f' in parents and name = 'it\\'s\\\\here'"
        );
    }

    #[test]
    fn test_parse_file() {
        let file = GoogleDriveStorage::parse_file(&json!({
            "id": "abc",
            "name": "AlertaIAGRO.xlsx",
            "createdTime": "2025-03-01T12:30:00.000Z"
        }))
        .unwrap();
        assert_eq!(file.id, "abc");
        assert_eq!(file.created_time.unwrap().timestamp(), 1740832200);

        let err = GoogleDriveStorage::parse_file(&json!({ "name": "x" })).unwrap_err();
        assert!(matches!(err, StorageError::MissingField { field } if field == "files[].id"));
    }

    #[test]
    fn test_status_error_mapping() {
        let body = r#"{"error":{"code":404,"message":"File not found: abc."}}"#;
        assert!(matches!(
            GoogleDriveStorage::status_error(404, body, Some("abc")),
            StorageError::NotFound { file_id } if file_id == "abc"
        ));
        assert!(matches!(
            GoogleDriveStorage::status_error(403, "denied", None),
            StorageError::Unauthorized { message } if message == "denied"
        ));
        assert!(matches!(
            GoogleDriveStorage::status_error(500, body, None),
            StorageError::ApiError { status: 500, message } if message == "File not found: abc."
        ));
    }
}
