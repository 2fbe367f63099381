//! Messaging transport: outbound text delivery and inbound user messages.

use async_trait::async_trait;

use crate::messenger::error::MessengerError;

pub mod error;
pub mod telegram;

/// A text message received from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Endpoint the message came from, and where replies go.
    pub endpoint_id: String,
    pub text: String,
}

/// One entry of the inbound event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundUpdate {
    /// Monotonic position in the stream, used to acknowledge consumption.
    pub update_id: i64,
    /// `None` for updates that carry no text message (edits, joins, ...).
    pub message: Option<InboundMessage>,
}

/// Delivers text to an endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, endpoint_id: &str, text: &str) -> Result<(), MessengerError>;

    /// Sends text rendered as Markdown where the transport supports it.
    async fn send_markdown(&self, endpoint_id: &str, text: &str) -> Result<(), MessengerError> {
        self.send_text(endpoint_id, text).await
    }
}

/// Source of inbound user messages.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetches updates after `offset` (exclusive), waiting for new ones if the
    /// transport supports long polling.
    async fn poll_updates(&self, offset: Option<i64>) -> Result<Vec<InboundUpdate>, MessengerError>;
}
