use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use alert_relay::decoder::AlertColumns;
use alert_relay::decoder::SheetDecoder;
use alert_relay::decoder::error::DecodeError;
use alert_relay::messenger::Messenger;
use alert_relay::messenger::error::MessengerError;
use alert_relay::model::AlertRow;
use alert_relay::model::FileRef;
use alert_relay::repository::Repository;
use alert_relay::storage::Storage;
use alert_relay::storage::error::StorageError;
use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

/// Creates a repository over files in a fresh temporary directory.
pub fn setup_repository() -> (Repository, PathBuf) {
    let dir = std::env::temp_dir().join(format!("alert-relay-test-{}", Uuid::new_v4()));
    let repository = Repository::new(dir.join("subscribers.txt"), dir.join("last_file.txt"));
    (repository, dir)
}

pub fn teardown_repository(dir: PathBuf) {
    if dir.exists() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

#[allow(dead_code)]
pub fn file_ref(id: &str) -> FileRef {
    FileRef {
        id: id.to_string(),
        name: "AlertaIAGRO.xlsx".to_string(),
        created_time: None,
    }
}

// MOCK STORAGE

#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct MockStorage {
    pub state: Arc<RwLock<MockStorageState>>,
}

#[derive(Default)]
#[allow(dead_code)]
pub struct MockStorageState {
    /// Newest first, as the listing query orders them.
    pub files: Vec<FileRef>,
    pub contents: HashMap<String, Vec<u8>>,
    pub list_calls: usize,
    pub downloads: Vec<String>,
    pub fail_listing: bool,
    /// Listing waits this long before answering.
    pub listing_delay: Option<Duration>,
}

#[allow(dead_code)]
impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a new version of the alert file.
    pub fn publish(&self, id: &str, contents: &str) {
        let mut state = self.state.write().unwrap();
        state.files.insert(0, file_ref(id));
        state
            .contents
            .insert(id.to_string(), contents.as_bytes().to_vec());
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.state.write().unwrap().fail_listing = fail;
    }

    pub fn set_listing_delay(&self, delay: Duration) {
        self.state.write().unwrap().listing_delay = Some(delay);
    }

    pub fn downloads(&self) -> Vec<String> {
        self.state.read().unwrap().downloads.clone()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn list_files(
        &self,
        _parent_id: &str,
        _name: &str,
        _exclude_trashed: bool,
    ) -> Result<Vec<FileRef>, StorageError> {
        let delay = self.state.read().unwrap().listing_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();
        state.list_calls += 1;
        if state.fail_listing {
            return Err(StorageError::ApiError {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(state.files.iter().take(1).cloned().collect())
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        let mut state = self.state.write().unwrap();
        state.downloads.push(file_id.to_string());
        state
            .contents
            .get(file_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                file_id: file_id.to_string(),
            })
    }
}

// MOCK MESSENGER

#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct MockMessenger {
    pub state: Arc<RwLock<MockMessengerState>>,
    /// Notified whenever a send starts.
    pub sending: Arc<Notify>,
}

#[derive(Default)]
#[allow(dead_code)]
pub struct MockMessengerState {
    /// Successfully delivered `(endpoint_id, text)` pairs, in order.
    pub sent: Vec<(String, String)>,
    pub markdown: Vec<(String, String)>,
    pub failing_endpoints: HashSet<String>,
    /// Sends to these endpoints wait this long before completing.
    pub delays: HashMap<String, Duration>,
}

#[allow(dead_code)]
impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, endpoint_id: &str) {
        self.state
            .write()
            .unwrap()
            .failing_endpoints
            .insert(endpoint_id.to_string());
    }

    pub fn delay_for(&self, endpoint_id: &str, delay: Duration) {
        self.state
            .write()
            .unwrap()
            .delays
            .insert(endpoint_id.to_string(), delay);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.state.read().unwrap().sent.clone()
    }

    pub fn markdown(&self) -> Vec<(String, String)> {
        self.state.read().unwrap().markdown.clone()
    }

    /// The last plain-text reply delivered to `endpoint_id`.
    pub fn last_reply(&self, endpoint_id: &str) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .rev()
            .find(|(endpoint, _)| endpoint == endpoint_id)
            .map(|(_, text)| text.clone())
    }

    fn check(&self, endpoint_id: &str) -> Result<(), MessengerError> {
        if self
            .state
            .read()
            .unwrap()
            .failing_endpoints
            .contains(endpoint_id)
        {
            return Err(MessengerError::ApiError {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send_text(&self, endpoint_id: &str, text: &str) -> Result<(), MessengerError> {
        self.sending.notify_one();
        let delay = self.state.read().unwrap().delays.get(endpoint_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check(endpoint_id)?;
        self.state
            .write()
            .unwrap()
            .sent
            .push((endpoint_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_markdown(&self, endpoint_id: &str, text: &str) -> Result<(), MessengerError> {
        self.check(endpoint_id)?;
        self.state
            .write()
            .unwrap()
            .markdown
            .push((endpoint_id.to_string(), text.to_string()));
        Ok(())
    }
}

// CSV DECODER

/// Reads comma-separated text with a header row, standing in for a workbook.
#[allow(dead_code)]
pub struct CsvDecoder {
    pub columns: AlertColumns,
}

#[allow(dead_code)]
impl CsvDecoder {
    pub fn new() -> Self {
        Self {
            columns: AlertColumns::new("Fone", "Texto"),
        }
    }
}

impl SheetDecoder for CsvDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<AlertRow>, DecodeError> {
        let text = String::from_utf8_lossy(bytes);
        let table = text
            .lines()
            .map(|line| line.split(',').map(str::to_string).collect::<Vec<_>>());
        self.columns.rows_from_table(table)
    }
}
