//! Telegram Bot API transport.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::Quota;
use governor::RateLimiter;
use governor::clock::QuantaClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use log::debug;
use log::info;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::USER_AGENT;

use crate::messenger::InboundMessage;
use crate::messenger::InboundUpdate;
use crate::messenger::Messenger;
use crate::messenger::UpdateSource;
use crate::messenger::error::MessengerError;

const RATE_LIMITED_CODE: i64 = 429;

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Deserialize)]
struct TgMessage {
    chat: TgChat,
    text: Option<String>,
}

#[derive(Deserialize)]
struct TgChat {
    id: i64,
}

/// Client for the Telegram Bot HTTP API.
pub struct TelegramClient {
    api_url: String,
    token: String,
    client: Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, QuantaClock>,
    long_poll_timeout: Duration,
}

impl TelegramClient {
    /// Creates a client limited to `send_rate_per_second` outgoing messages.
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        send_rate_per_second: u32,
        long_poll_timeout: Duration,
    ) -> Result<Self, MessengerError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("alert-relay/0.1"));
        let client = Client::builder().default_headers(headers).build()?;

        // Telegram allows roughly 30 messages per second per bot.
        let rate = NonZeroU32::new(send_rate_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
            limiter,
            long_poll_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_url, self.token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &Value,
    ) -> Result<T, MessengerError> {
        debug!("Calling Telegram method {method}");
        let response = self
            .client
            .post(self.method_url(method))
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let resp: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(resp) => resp,
            Err(_) if !status.is_success() => {
                return Err(MessengerError::ApiError {
                    code: status.as_u16().into(),
                    description: body,
                });
            }
            Err(e) => return Err(e.into()),
        };

        Self::into_result(resp, status.as_u16().into())
    }

    fn into_result<T>(resp: ApiResponse<T>, http_code: i64) -> Result<T, MessengerError> {
        if !resp.ok {
            let code = resp.error_code.unwrap_or(http_code);
            if code == RATE_LIMITED_CODE {
                let retry_after = resp
                    .parameters
                    .and_then(|p| p.retry_after)
                    .unwrap_or(1);
                return Err(MessengerError::RateLimited { retry_after });
            }
            return Err(MessengerError::ApiError {
                code,
                description: resp
                    .description
                    .unwrap_or_else(|| "Unknown API error".to_string()),
            });
        }

        resp.result.ok_or_else(|| MessengerError::ApiError {
            code: http_code,
            description: "Response is missing `result`".to_string(),
        })
    }

    async fn send_message(
        &self,
        endpoint_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(), MessengerError> {
        if self.limiter.check().is_err() {
            info!("Outgoing messages are ratelimited. Waiting...");
        }
        self.limiter.until_ready().await;

        let mut payload = json!({
            "chat_id": endpoint_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            payload["parse_mode"] = Value::from(mode);
        }

        self.call::<Value>("sendMessage", &payload).await?;
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(&self, endpoint_id: &str, text: &str) -> Result<(), MessengerError> {
        self.send_message(endpoint_id, text, None).await
    }

    async fn send_markdown(&self, endpoint_id: &str, text: &str) -> Result<(), MessengerError> {
        self.send_message(endpoint_id, text, Some("Markdown")).await
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn poll_updates(&self, offset: Option<i64>) -> Result<Vec<InboundUpdate>, MessengerError> {
        let mut payload = json!({
            "timeout": self.long_poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            payload["offset"] = Value::from(offset);
        }

        let updates: Vec<TgUpdate> = self.call("getUpdates", &payload).await?;
        Ok(updates
            .into_iter()
            .map(|update| InboundUpdate {
                update_id: update.update_id,
                message: update.message.and_then(|msg| {
                    msg.text.map(|text| InboundMessage {
                        endpoint_id: msg.chat.id.to_string(),
                        text,
                    })
                }),
            })
            .collect())
    }
}
