//! Subscription registry operations.

use std::sync::Arc;

use log::debug;
use log::info;
use tokio::sync::Mutex;

use crate::model::Subscription;
use crate::model::SubscriptionMap;
use crate::repository::registry::SubscriptionStore;
use crate::service::error::ServiceError;

/// Registry access for the command handler and the dispatcher.
///
/// Every read-modify-write of the store happens under one lock, so concurrent
/// commands cannot lose each other's updates.
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    write_lock: Mutex<()>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns a point-in-time copy of the registry.
    pub async fn snapshot(&self) -> Result<SubscriptionMap, ServiceError> {
        let _guard = self.write_lock.lock().await;
        Ok(self.store.load()?)
    }

    /// Binds `recipient_key` to `endpoint_id` and activates it.
    ///
    /// Re-subscribing overwrites the endpoint.
    pub async fn subscribe(
        &self,
        recipient_key: &str,
        endpoint_id: &str,
    ) -> Result<SubscribeResult, ServiceError> {
        check_field("recipient key", recipient_key)?;
        check_field("endpoint id", endpoint_id)?;

        let _guard = self.write_lock.lock().await;
        let mut subscriptions = self.store.load()?;

        let previous = subscriptions.insert(
            recipient_key.to_string(),
            Subscription::new(recipient_key, endpoint_id),
        );
        self.store.save(&subscriptions)?;

        let result = match previous {
            None => SubscribeResult::Created,
            Some(prev) => SubscribeResult::Renewed {
                previous_endpoint: prev.endpoint_id,
                was_active: prev.active,
            },
        };
        info!("Subscribed recipient {recipient_key} to endpoint {endpoint_id}: {result:?}");
        Ok(result)
    }

    /// Deactivates every subscription delivered to `endpoint_id`.
    pub async fn unsubscribe_by_endpoint(
        &self,
        endpoint_id: &str,
    ) -> Result<UnsubscribeResult, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut subscriptions = self.store.load()?;

        let mut matched = 0;
        let mut deactivated = 0;
        for sub in subscriptions
            .values_mut()
            .filter(|sub| sub.endpoint_id == endpoint_id)
        {
            matched += 1;
            if sub.active {
                sub.active = false;
                deactivated += 1;
            }
        }

        if deactivated > 0 {
            self.store.save(&subscriptions)?;
            info!("Deactivated {deactivated} subscription(s) of endpoint {endpoint_id}");
            return Ok(UnsubscribeResult::Success { deactivated });
        }

        debug!("Endpoint {endpoint_id} had nothing to deactivate ({matched} matches)");
        if matched > 0 {
            Ok(UnsubscribeResult::AlreadyUnsubscribed)
        } else {
            Ok(UnsubscribeResult::NoneSubscribed)
        }
    }
}

/// Rejects values that would break the one-record-per-line registry format.
fn check_field(field: &'static str, value: &str) -> Result<(), ServiceError> {
    if value.is_empty() || value.contains(|c: char| c == ';' || c.is_control()) {
        return Err(ServiceError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscribeResult {
    Created,
    Renewed {
        previous_endpoint: String,
        was_active: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnsubscribeResult {
    Success { deactivated: usize },
    AlreadyUnsubscribed,
    NoneSubscribed,
}
