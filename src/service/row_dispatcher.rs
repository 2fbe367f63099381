//! Delivers the rows of an alert file to their subscribers.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use log::error;
use log::info;
use tokio::time::timeout;

use crate::decoder::SheetDecoder;
use crate::messenger::Messenger;
use crate::messenger::error::MessengerError;
use crate::model::DispatchReport;
use crate::model::FileRef;
use crate::repository::marker::MarkerStore;
use crate::service::error::CycleError;
use crate::service::subscription_service::SubscriptionService;
use crate::storage::Storage;
use crate::storage::error::StorageError;

/// Downloads, decodes and sends one alert file.
pub struct RowDispatcher {
    storage: Arc<dyn Storage>,
    decoder: Arc<dyn SheetDecoder>,
    messenger: Arc<dyn Messenger>,
    subscriptions: Arc<SubscriptionService>,
    marker: Arc<dyn MarkerStore>,
    request_timeout: Duration,
}

impl RowDispatcher {
    pub fn new(
        storage: Arc<dyn Storage>,
        decoder: Arc<dyn SheetDecoder>,
        messenger: Arc<dyn Messenger>,
        subscriptions: Arc<SubscriptionService>,
        marker: Arc<dyn MarkerStore>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            decoder,
            messenger,
            subscriptions,
            marker,
            request_timeout,
        }
    }

    /// Sends every row of `file` to its active subscriber, then advances the marker.
    ///
    /// Download and decode failures abort before anything is sent and leave the
    /// marker untouched. Individual send failures are counted and logged; the
    /// marker is advanced regardless, so failed recipients are not retried for
    /// this file.
    #[tracing::instrument(skip_all, fields(file_id = %file.id))]
    pub async fn dispatch(&self, file: &FileRef) -> Result<DispatchReport, CycleError> {
        let bytes = timeout(self.request_timeout, self.storage.download(&file.id))
            .await
            .map_err(|_| StorageError::Timeout {
                secs: self.request_timeout.as_secs(),
            })??;
        debug!("Downloaded {} bytes of {file}", bytes.len());

        let rows = self.decoder.decode(&bytes)?;
        info!("Decoded {} rows from {file}", rows.len());

        let subscriptions = self.subscriptions.snapshot().await?;
        let mut report = DispatchReport::default();

        for row in rows {
            let endpoint_id = match subscriptions.get(&row.recipient_key) {
                Some(sub) if sub.active => &sub.endpoint_id,
                _ => {
                    debug!("Skipping unregistered or inactive recipient {}", row.recipient_key);
                    report.skipped += 1;
                    continue;
                }
            };

            report.attempted += 1;
            match self.send(endpoint_id, &row.message_text).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    error!("Failed to send alert to {}: {e}", row.recipient_key);
                    report.failed += 1;
                }
            }
        }

        self.marker.write(&file.id)?;
        info!("Dispatched {file}: {report}");
        Ok(report)
    }

    async fn send(&self, endpoint_id: &str, text: &str) -> Result<(), MessengerError> {
        timeout(self.request_timeout, self.messenger.send_text(endpoint_id, text))
            .await
            .map_err(|_| MessengerError::Timeout {
                secs: self.request_timeout.as_secs(),
            })?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mockall::predicate::eq;

    use super::*;
    use crate::decoder::error::DecodeError;
    use crate::messenger::MockMessenger;
    use crate::model::AlertRow;
    use crate::repository::marker::FileMarkerStore;
    use crate::repository::registry::FlatFileSubscriptionStore;

    struct FixedStorage;

    #[async_trait]
    impl Storage for FixedStorage {
        async fn list_files(
            &self,
            _parent_id: &str,
            _name: &str,
            _exclude_trashed: bool,
        ) -> Result<Vec<FileRef>, StorageError> {
            Ok(Vec::new())
        }

        async fn download(&self, _file_id: &str) -> Result<Vec<u8>, StorageError> {
            Ok(b"sheet".to_vec())
        }
    }

    struct FixedDecoder(Mutex<Option<Result<Vec<AlertRow>, DecodeError>>>);

    impl SheetDecoder for FixedDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<Vec<AlertRow>, DecodeError> {
            self.0.lock().unwrap().take().unwrap_or(Ok(Vec::new()))
        }
    }

    struct Fixture {
        dir: std::path::PathBuf,
        subscriptions: Arc<SubscriptionService>,
        marker: Arc<FileMarkerStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("alert-relay-dispatch-{}", uuid::Uuid::new_v4()));
            let store = Arc::new(FlatFileSubscriptionStore::new(dir.join("subs.txt")));
            Self {
                subscriptions: Arc::new(SubscriptionService::new(store)),
                marker: Arc::new(FileMarkerStore::new(dir.join("marker.txt"))),
                dir,
            }
        }

        fn dispatcher(
            &self,
            decoded: Result<Vec<AlertRow>, DecodeError>,
            messenger: MockMessenger,
        ) -> RowDispatcher {
            RowDispatcher::new(
                Arc::new(FixedStorage),
                Arc::new(FixedDecoder(Mutex::new(Some(decoded)))),
                Arc::new(messenger),
                self.subscriptions.clone(),
                self.marker.clone(),
                Duration::from_secs(5),
            )
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn file(id: &str) -> FileRef {
        FileRef {
            id: id.to_string(),
            name: "AlertaIAGRO.xlsx".to_string(),
            created_time: None,
        }
    }

    #[tokio::test]
    async fn test_send_failure_is_isolated_per_row() {
        let fx = Fixture::new();
        fx.subscriptions.subscribe("6700000001", "1").await.unwrap();
        fx.subscriptions.subscribe("6700000002", "2").await.unwrap();
        fx.subscriptions.subscribe("6700000003", "3").await.unwrap();

        let mut messenger = MockMessenger::new();
        messenger
            .expect_send_text()
            .with(eq("1"), eq("one"))
            .times(1)
            .returning(|_, _| Ok(()));
        messenger
            .expect_send_text()
            .with(eq("2"), eq("two"))
            .times(1)
            .returning(|_, _| {
                Err(MessengerError::ApiError {
                    code: 403,
                    description: "Forbidden".to_string(),
                })
            });
        messenger
            .expect_send_text()
            .with(eq("3"), eq("three"))
            .times(1)
            .returning(|_, _| Ok(()));

        let rows = vec![
            AlertRow::new("6700000001", "one"),
            AlertRow::new("6700000002", "two"),
            AlertRow::new("6700000003", "three"),
        ];
        let report = fx
            .dispatcher(Ok(rows), messenger)
            .dispatch(&file("f1"))
            .await
            .unwrap();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(fx.marker.read().unwrap().as_deref(), Some("f1"));
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_recipients_are_skipped() {
        let fx = Fixture::new();
        fx.subscriptions.subscribe("6700000001", "1").await.unwrap();
        fx.subscriptions.subscribe("6700000002", "2").await.unwrap();
        fx.subscriptions.unsubscribe_by_endpoint("2").await.unwrap();

        let mut messenger = MockMessenger::new();
        messenger
            .expect_send_text()
            .with(eq("1"), eq("hello"))
            .times(1)
            .returning(|_, _| Ok(()));

        let rows = vec![
            AlertRow::new("6799999999", "nobody"),
            AlertRow::new("6700000002", "opted out"),
            AlertRow::new("6700000001", "hello"),
        ];
        let report = fx
            .dispatcher(Ok(rows), messenger)
            .dispatch(&file("f1"))
            .await
            .unwrap();

        assert_eq!(
            report,
            DispatchReport {
                attempted: 1,
                sent: 1,
                failed: 0,
                skipped: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_decode_error_keeps_marker() {
        let fx = Fixture::new();
        fx.marker.write("previous").unwrap();

        let mut messenger = MockMessenger::new();
        messenger.expect_send_text().never();

        let err = fx
            .dispatcher(
                Err(DecodeError::MissingColumn {
                    column: "Texto".to_string(),
                }),
                messenger,
            )
            .dispatch(&file("broken"))
            .await
            .unwrap_err();

        assert!(matches!(err, CycleError::DecodeError(_)));
        assert_eq!(fx.marker.read().unwrap().as_deref(), Some("previous"));
    }
}
