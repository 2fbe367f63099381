use crate::decoder::error::DecodeError;
use crate::repository::error::StoreError;
use crate::storage::error::StorageError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("StoreError: {0}")]
    StoreError(#[from] StoreError),

    #[error("Invalid {field} `{value}`: must be non-empty without `;` or control characters")]
    InvalidField { field: &'static str, value: String },
}

/// Failures that abort a poll-and-dispatch cycle without advancing the marker.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CycleError {
    #[error("StorageError: {0}")]
    StorageError(#[from] StorageError),

    #[error("DecodeError: {0}")]
    DecodeError(#[from] DecodeError),

    #[error("StoreError: {0}")]
    StoreError(#[from] StoreError),

    #[error("ServiceError: {0}")]
    ServiceError(ServiceError),
}

impl From<ServiceError> for CycleError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::StoreError(e) => CycleError::StoreError(e),
            other => CycleError::ServiceError(other),
        }
    }
}
