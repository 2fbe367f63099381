//! Detects whether a new alert file has appeared since the last dispatch.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use log::info;
use tokio::time::timeout;

use crate::model::FileRef;
use crate::repository::marker::MarkerStore;
use crate::service::error::CycleError;
use crate::storage::Storage;
use crate::storage::error::StorageError;

/// Compares the newest matching file in storage against the marker.
pub struct SourcePoller {
    storage: Arc<dyn Storage>,
    marker: Arc<dyn MarkerStore>,
    folder_id: String,
    file_name: String,
    request_timeout: Duration,
}

impl SourcePoller {
    pub fn new(
        storage: Arc<dyn Storage>,
        marker: Arc<dyn MarkerStore>,
        folder_id: impl Into<String>,
        file_name: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            marker,
            folder_id: folder_id.into(),
            file_name: file_name.into(),
            request_timeout,
        }
    }

    /// Returns the newest non-trashed file with the configured name, if any.
    pub async fn find_latest_matching_file(&self) -> Result<Option<FileRef>, StorageError> {
        let listing = self
            .storage
            .list_files(&self.folder_id, &self.file_name, true);
        let files = timeout(self.request_timeout, listing)
            .await
            .map_err(|_| StorageError::Timeout {
                secs: self.request_timeout.as_secs(),
            })??;
        Ok(files.into_iter().next())
    }

    /// True iff `current` exists and differs from the processed marker.
    pub fn has_new_version(current: Option<&FileRef>, marker: Option<&str>) -> bool {
        current.is_some_and(|file| marker != Some(file.id.as_str()))
    }

    /// Looks up storage and the marker and classifies the result.
    pub async fn check(&self) -> Result<PollResult, CycleError> {
        let marker = self.marker.read()?;
        let current = self.find_latest_matching_file().await?;

        let result = match current {
            None => {
                info!(
                    "No file named `{}` found in folder {}.",
                    self.file_name, self.folder_id
                );
                PollResult::NoFile
            }
            Some(file) if !Self::has_new_version(Some(&file), marker.as_deref()) => {
                debug!("{file} was already processed.");
                PollResult::AlreadyProcessed { file }
            }
            Some(file) => {
                info!(
                    "New version found: {} -> {}",
                    marker.as_deref().unwrap_or("None"),
                    file
                );
                PollResult::NewVersion { file }
            }
        };
        Ok(result)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollResult {
    NoFile,
    AlreadyProcessed { file: FileRef },
    NewVersion { file: FileRef },
}
