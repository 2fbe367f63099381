use crate::messenger::error::MessengerError;
use crate::service::error::ServiceError;

/// Rejection of inbound registration text. Shown to the user, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("Recipient key must contain only digits, got `{value}`")]
    NotDigits { value: String },

    #[error("Recipient key must have at least {min} digits, got {len}")]
    TooShort { len: usize, min: usize },
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BotError {
    #[error("MessengerError: {0}")]
    MessengerError(#[from] MessengerError),

    #[error("ServiceError: {0}")]
    ServiceError(#[from] ServiceError),
}
