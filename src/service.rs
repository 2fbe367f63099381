//! Business logic: registry operations, source polling and row dispatch.

use std::sync::Arc;

use crate::config::Config;
use crate::decoder::SheetDecoder;
use crate::messenger::Messenger;
use crate::repository::Repository;
use crate::service::row_dispatcher::RowDispatcher;
use crate::service::source_poller::SourcePoller;
use crate::service::subscription_service::SubscriptionService;
use crate::storage::Storage;

pub mod error;
pub mod row_dispatcher;
pub mod source_poller;
pub mod subscription_service;

/// Container for all application services.
pub struct Services {
    pub subscription: Arc<SubscriptionService>,
    pub poller: Arc<SourcePoller>,
    pub dispatcher: Arc<RowDispatcher>,
}

impl Services {
    /// Wires the services over the given stores and transports.
    pub fn new(
        config: &Config,
        repository: &Repository,
        storage: Arc<dyn Storage>,
        decoder: Arc<dyn SheetDecoder>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let subscription = Arc::new(SubscriptionService::new(repository.registry.clone()));
        let poller = Arc::new(SourcePoller::new(
            storage.clone(),
            repository.marker.clone(),
            config.drive_folder_id.clone(),
            config.alert_file_name.clone(),
            config.request_timeout,
        ));
        let dispatcher = Arc::new(RowDispatcher::new(
            storage,
            decoder,
            messenger,
            subscription.clone(),
            repository.marker.clone(),
            config.request_timeout,
        ));

        Self {
            subscription,
            poller,
            dispatcher,
        }
    }
}
