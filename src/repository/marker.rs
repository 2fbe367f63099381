//! Cursor recording the last dispatched source file.

use std::path::PathBuf;

use crate::repository::error::StoreError;
use crate::repository::read_optional;
use crate::repository::write_atomic;

/// Single-value store holding the identifier of the last processed file.
pub trait MarkerStore: Send + Sync {
    /// Returns the stored identifier, or `None` if nothing was processed yet.
    fn read(&self) -> Result<Option<String>, StoreError>;

    /// Replaces the stored identifier.
    fn write(&self, file_id: &str) -> Result<(), StoreError>;
}

/// Marker kept as a one-line text file.
pub struct FileMarkerStore {
    path: PathBuf,
}

impl FileMarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MarkerStore for FileMarkerStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(read_optional(&self.path)?
            .map(|contents| contents.trim().to_string())
            .filter(|id| !id.is_empty()))
    }

    fn write(&self, file_id: &str) -> Result<(), StoreError> {
        write_atomic(&self.path, file_id)
    }
}
