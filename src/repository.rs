//! Flat-file persistence for the subscription registry and the processed-file marker.

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;
use uuid::Uuid;

use crate::repository::error::StoreError;
use crate::repository::marker::FileMarkerStore;
use crate::repository::marker::MarkerStore;
use crate::repository::registry::FlatFileSubscriptionStore;
use crate::repository::registry::SubscriptionStore;

pub mod error;
pub mod marker;
pub mod registry;

/// Holds the two persisted stores owned by this process.
pub struct Repository {
    pub registry: Arc<dyn SubscriptionStore>,
    pub marker: Arc<dyn MarkerStore>,
}

impl Repository {
    /// Creates flat-file backed stores at the given paths.
    pub fn new(registry_path: impl Into<PathBuf>, marker_path: impl Into<PathBuf>) -> Self {
        Self {
            registry: Arc::new(FlatFileSubscriptionStore::new(registry_path)),
            marker: Arc::new(FileMarkerStore::new(marker_path)),
        }
    }
}

/// Replaces `path` with `contents` through a sibling temp file and a rename.
///
/// Readers observe either the old or the new file, never a truncated one.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    let write_tmp = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    };

    if let Err(e) = write_tmp() {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(io_err(e));
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(io_err(e));
    }

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Reads `path` to a string, mapping a missing file to `None`.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
