//! Long-polling loop feeding inbound messages to the command handler.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::debug;
use log::error;
use log::info;
use log::warn;
use tokio::time::sleep;
use tokio::time::timeout;

use crate::bot::commands::CommandHandler;
use crate::messenger::UpdateSource;
use crate::messenger::error::MessengerError;

/// Pause before polling again after a transport failure.
const RETRY_DELAY_SECS: u64 = 5;

/// Consumes the inbound update stream one message at a time.
///
/// Messages are handled in arrival order, so later commands from the same
/// user always supersede earlier ones.
pub struct UpdateListener {
    source: Arc<dyn UpdateSource>,
    handler: Arc<CommandHandler>,
    poll_timeout: Duration,
    running: AtomicBool,
}

impl UpdateListener {
    /// `poll_timeout` bounds a single long-poll request, including the server-side wait.
    pub fn new(
        source: Arc<dyn UpdateSource>,
        handler: Arc<CommandHandler>,
        poll_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            handler,
            poll_timeout,
            running: AtomicBool::new(false),
        })
    }

    pub fn start(self: Arc<Self>) -> anyhow::Result<()> {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("Starting UpdateListener.");
            self.spawn_poll_loop();
        }
        Ok(())
    }

    pub fn stop(self: Arc<Self>) -> anyhow::Result<()> {
        info!("Stopping UpdateListener.");
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn spawn_poll_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut offset = None;
            while self.running.load(Ordering::SeqCst) {
                match self.poll_once(offset).await {
                    Ok(next) => offset = next,
                    Err(MessengerError::RateLimited { retry_after }) => {
                        warn!("Update polling rate limited, retrying in {retry_after}s");
                        sleep(Duration::from_secs(retry_after)).await;
                    }
                    Err(e) => {
                        error!("Failed to poll updates: {e}");
                        sleep(Duration::from_secs(RETRY_DELAY_SECS)).await;
                    }
                }
            }
            info!("Stopped polling updates.");
        });
    }

    /// Fetches one batch of updates after `offset`, handles them in order and
    /// returns the offset to poll from next.
    ///
    /// Handler failures are logged and the update is still acknowledged.
    pub async fn poll_once(&self, offset: Option<i64>) -> Result<Option<i64>, MessengerError> {
        let updates = timeout(self.poll_timeout, self.source.poll_updates(offset))
            .await
            .map_err(|_| MessengerError::Timeout {
                secs: self.poll_timeout.as_secs(),
            })??;

        let mut next = offset;
        for update in updates {
            next = Some(next.map_or(update.update_id + 1, |n| n.max(update.update_id + 1)));
            let Some(message) = update.message else {
                debug!("Ignoring update {} without a text message", update.update_id);
                continue;
            };
            if let Err(e) = self.handler.handle(&message).await {
                error!(
                    "Failed to handle message from endpoint {}: {e}",
                    message.endpoint_id
                );
            }
        }
        Ok(next)
    }
}
