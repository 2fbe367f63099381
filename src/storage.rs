//! Cloud storage transport used to find and fetch alert files.

use async_trait::async_trait;

use crate::model::FileRef;
use crate::storage::error::StorageError;

pub mod error;
pub mod google_auth;
pub mod google_drive;

/// Read-only access to a folder-based file store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Lists files named exactly `name` under `parent_id`, newest first by
    /// creation time.
    async fn list_files(
        &self,
        parent_id: &str,
        name: &str,
        exclude_trashed: bool,
    ) -> Result<Vec<FileRef>, StorageError>;

    /// Downloads the raw content of a file.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError>;
}
