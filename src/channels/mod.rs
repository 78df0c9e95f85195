//! Messaging channel adapters
//!
//! A channel is the transport the bridge talks to the remote bot through. It
//! sends text, exposes the recent history of the bot conversation, and pushes
//! reaction notifications into a [`ReactionSink`].

mod history;
pub mod retry;
mod whatsapp;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use history::{DEFAULT_HISTORY_LIMIT, MessageHistory};
pub use retry::RetryPolicy;
pub use whatsapp::{
    WhatsAppChannel, WhatsAppWebhook, normalize_number, verify_signature,
    verify_webhook_subscription,
};

use crate::Result;

/// A message accepted by the remote network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Transport-assigned message identifier
    pub id: String,
}

/// A message from the history of a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    /// Message identifier (platform-specific)
    pub id: String,

    /// Whether this bridge authored the message
    pub author_is_self: bool,

    /// Message body
    pub body: String,

    /// When the message arrived
    pub timestamp: DateTime<Utc>,
}

/// An emoji reaction attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    /// Reaction emoji; empty when the sender removed its reaction
    pub emoji: String,

    /// Sender identifier
    pub sender_id: String,

    /// When the reaction was made
    pub timestamp: DateTime<Utc>,

    /// Message the reaction is attached to
    pub target_message_id: String,
}

/// Receiver for reaction notifications
///
/// Called from the channel's event delivery path, so implementations must not
/// block on I/O and must not fail.
pub trait ReactionSink: Send + Sync {
    /// Record a reaction event
    fn on_reaction(&self, event: ReactionEvent);
}

/// Trait for messaging channel adapters
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &'static str;

    /// Whether a live session exists and sends may be attempted
    fn is_ready(&self) -> bool;

    /// Send a text message to a conversation
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotReady`] when there is no live session, or a
    /// channel error when the network rejects the message
    async fn send(&self, conversation: &str, text: &str) -> Result<SentMessage>;

    /// Fetch the most recent messages of a conversation, oldest first
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotReady`] when there is no live session
    async fn fetch_recent_messages(
        &self,
        conversation: &str,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>>;
}
