#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to parse API response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("Invalid data from API: missing field `{field}`.")]
    MissingField { field: String },

    #[error("Storage authorization failed: {message}")]
    Unauthorized { message: String },

    #[error("File not found (ID: {file_id}).")]
    NotFound { file_id: String },

    #[error("Storage API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("Storage request timed out after {secs}s.")]
    Timeout { secs: u64 },
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::RequestFailed(Box::new(e))
    }
}

impl From<jsonwebtoken::errors::Error> for StorageError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        StorageError::InvalidCredentials {
            message: e.to_string(),
        }
    }
}
