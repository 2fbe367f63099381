//! Background task running the poll-and-dispatch cycle.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::debug;
use log::error;
use log::info;
use tokio::sync::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::model::DispatchReport;
use crate::model::FileRef;
use crate::service::error::CycleError;
use crate::service::row_dispatcher::RowDispatcher;
use crate::service::source_poller::PollResult;
use crate::service::source_poller::SourcePoller;

/// Task that periodically checks storage for a new alert file and dispatches it.
pub struct AlertPublisher {
    poller: Arc<SourcePoller>,
    dispatcher: Arc<RowDispatcher>,
    poll_interval: Duration,
    running: AtomicBool,
    shutdown: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AlertPublisher {
    /// Creates a new alert publisher with the given poll interval.
    pub fn new(
        poller: Arc<SourcePoller>,
        dispatcher: Arc<RowDispatcher>,
        poll_interval: Duration,
    ) -> Arc<Self> {
        info!(
            "Initializing AlertPublisher with poll interval {:?}",
            poll_interval
        );
        Arc::new(Self {
            poller,
            dispatcher,
            poll_interval,
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
            task: Mutex::new(None),
        })
    }

    /// Starts the polling loop. The first cycle runs immediately.
    pub async fn start(self: Arc<Self>) -> anyhow::Result<()> {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("Starting AlertPublisher check loop.");
            let handle = self.clone().spawn_check_loop();
            *self.task.lock().await = Some(handle);
        }
        Ok(())
    }

    /// Stops the polling loop and waits for an in-flight cycle to finish, so
    /// a dispatch that already sent rows still records its marker.
    pub async fn stop(&self) -> anyhow::Result<()> {
        info!("Stopping AlertPublisher check loop.");
        self.running.store(false, Ordering::SeqCst);
        // Stores a permit when the loop is busy, so the next select sees it.
        self.shutdown.notify_one();

        if let Some(handle) = self.task.lock().await.take() {
            handle.await?;
        }
        Ok(())
    }

    fn spawn_check_loop(self: Arc<Self>) -> JoinHandle<()> {
        let mut interval = tokio::time::interval(self.poll_interval);
        // Cycles run inline, so a slow one delays the next tick instead of bursting.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.notified() => break,
                    _ = interval.tick() => {}
                }
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = self.run_cycle().await {
                    error!("Alert cycle aborted, will retry next tick: {e}");
                }
            }
            info!("Stopped check loop.");
        })
    }

    /// Runs one complete poll-and-dispatch cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        debug!("Checking for a new alert file.");

        let outcome = match self.poller.check().await? {
            PollResult::NoFile => CycleOutcome::NoFile,
            PollResult::AlreadyProcessed { file } => CycleOutcome::AlreadyProcessed { file },
            PollResult::NewVersion { file } => {
                let report = self.dispatcher.dispatch(&file).await?;
                CycleOutcome::Dispatched { file, report }
            }
        };

        debug!("Finished alert cycle: {outcome:?}");
        Ok(outcome)
    }
}

/// What a completed cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    NoFile,
    AlreadyProcessed { file: FileRef },
    Dispatched { file: FileRef, report: DispatchReport },
}
