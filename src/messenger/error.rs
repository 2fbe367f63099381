#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MessengerError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to parse API response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("Messaging API error {code}: {description}")]
    ApiError { code: i64, description: String },

    #[error("Rate limited by messaging API, retry after {retry_after}s.")]
    RateLimited { retry_after: u64 },

    #[error("Messaging request timed out after {secs}s.")]
    Timeout { secs: u64 },
}

impl From<reqwest::Error> for MessengerError {
    fn from(e: reqwest::Error) -> Self {
        MessengerError::RequestFailed(Box::new(e))
    }
}
