//! Data types shared by the registry, the poller and the dispatcher.

use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use chrono::Utc;

/// Registered recipients keyed by recipient key.
///
/// Ordered so the persisted registry is written deterministically.
pub type SubscriptionMap = BTreeMap<String, Subscription>;

/// One subscriber: a recipient key bound to a delivery endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    /// Normalized phone-number-like identifier, unique in the registry.
    pub recipient_key: String,
    /// Opaque destination handle supplied by the messaging transport.
    pub endpoint_id: String,
    /// Whether dispatched alerts are delivered to this recipient.
    pub active: bool,
}

impl Subscription {
    pub fn new(recipient_key: impl Into<String>, endpoint_id: impl Into<String>) -> Self {
        Self {
            recipient_key: recipient_key.into(),
            endpoint_id: endpoint_id.into(),
            active: true,
        }
    }
}

/// Reference to a file held by the storage transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRef {
    pub id: String,
    pub name: String,
    pub created_time: Option<DateTime<Utc>>,
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file id `{}` ({})", self.id, self.name)
    }
}

/// A single decoded row of the alert spreadsheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertRow {
    pub recipient_key: String,
    pub message_text: String,
}

impl AlertRow {
    /// Creates a row, trimming both fields.
    pub fn new(recipient_key: impl AsRef<str>, message_text: impl AsRef<str>) -> Self {
        Self {
            recipient_key: recipient_key.as_ref().trim().to_string(),
            message_text: message_text.as_ref().trim().to_string(),
        }
    }
}

/// Counters produced by one dispatch of a file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Rows that had an active subscriber and were handed to the messenger.
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    /// Rows whose recipient is unknown or inactive.
    pub skipped: usize,
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted={}, sent={}, failed={}, skipped={}",
            self.attempted, self.sent, self.failed, self.skipped
        )
    }
}
