//! Subscription registry store.
//!
//! One record per line, `endpoint_id;recipient_key;active_flag` with the flag
//! being `1` or `0`.

use std::path::PathBuf;

use log::debug;
use log::warn;

use crate::model::Subscription;
use crate::model::SubscriptionMap;
use crate::repository::error::StoreError;
use crate::repository::read_optional;
use crate::repository::write_atomic;

/// Whole-snapshot persistence for the subscription registry.
pub trait SubscriptionStore: Send + Sync {
    /// Loads every readable record. An absent store yields an empty map.
    fn load(&self) -> Result<SubscriptionMap, StoreError>;

    /// Replaces the persisted registry with `subscriptions`.
    fn save(&self, subscriptions: &SubscriptionMap) -> Result<(), StoreError>;
}

/// Registry kept in a semicolon-separated text file.
pub struct FlatFileSubscriptionStore {
    path: PathBuf,
}

impl FlatFileSubscriptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parses the registry text, skipping and logging corrupt records.
    pub fn parse(contents: &str) -> SubscriptionMap {
        let mut subscriptions = SubscriptionMap::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Self::parse_line(idx + 1, line) {
                Ok(sub) => {
                    subscriptions.insert(sub.recipient_key.clone(), sub);
                }
                Err(e) => warn!("Skipping registry record: {e}"),
            }
        }
        subscriptions
    }

    fn parse_line(line_no: usize, line: &str) -> Result<Subscription, StoreError> {
        let corrupt = |reason: String| StoreError::RegistryCorrupt {
            line: line_no,
            reason,
        };

        let fields: Vec<&str> = line.trim().split(';').map(str::trim).collect();
        let [endpoint_id, recipient_key, flag] = fields.as_slice() else {
            return Err(corrupt(format!(
                "expected 3 fields, found {}",
                fields.len()
            )));
        };

        if endpoint_id.is_empty() {
            return Err(corrupt("empty endpoint id".to_string()));
        }
        if recipient_key.is_empty() {
            return Err(corrupt("empty recipient key".to_string()));
        }
        let active = match *flag {
            "1" => true,
            "0" => false,
            other => return Err(corrupt(format!("invalid active flag `{other}`"))),
        };

        Ok(Subscription {
            recipient_key: recipient_key.to_string(),
            endpoint_id: endpoint_id.to_string(),
            active,
        })
    }

    /// Renders the registry in file order.
    pub fn render(subscriptions: &SubscriptionMap) -> String {
        subscriptions
            .values()
            .map(|sub| {
                format!(
                    "{};{};{}\n",
                    sub.endpoint_id,
                    sub.recipient_key,
                    if sub.active { "1" } else { "0" }
                )
            })
            .collect()
    }
}

impl SubscriptionStore for FlatFileSubscriptionStore {
    fn load(&self) -> Result<SubscriptionMap, StoreError> {
        let Some(contents) = read_optional(&self.path)? else {
            debug!("Registry {} does not exist yet.", self.path.display());
            return Ok(SubscriptionMap::new());
        };
        Ok(Self::parse(&contents))
    }

    fn save(&self, subscriptions: &SubscriptionMap) -> Result<(), StoreError> {
        write_atomic(&self.path, &Self::render(subscriptions))
    }
}
