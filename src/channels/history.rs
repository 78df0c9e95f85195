//! Bounded per-conversation message history
//!
//! The `WhatsApp` Cloud API has no "fetch history" call, so the channel keeps
//! the messages it sent and received in memory.

use std::collections::{HashMap, VecDeque};

use super::HistoryMessage;

/// Default number of messages kept per conversation
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Recent messages per conversation, deduplicated by message id
///
/// Webhook deliveries can be retried by the platform, so the same message
/// id may arrive more than once.
#[derive(Debug)]
pub struct MessageHistory {
    conversations: HashMap<String, VecDeque<HistoryMessage>>,
    max_per_conversation: usize,
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl MessageHistory {
    /// Create a history keeping at most `max_per_conversation` messages each
    #[must_use]
    pub fn new(max_per_conversation: usize) -> Self {
        Self {
            conversations: HashMap::new(),
            max_per_conversation: max_per_conversation.max(1),
        }
    }

    /// Record a message.
    ///
    /// Returns `false` if a message with the same id is already stored.
    pub fn record(&mut self, conversation: &str, message: HistoryMessage) -> bool {
        let messages = self
            .conversations
            .entry(conversation.to_string())
            .or_default();

        if messages.iter().any(|m| m.id == message.id) {
            return false;
        }

        messages.push_back(message);
        while messages.len() > self.max_per_conversation {
            messages.pop_front();
        }
        true
    }

    /// The last `limit` messages of a conversation, oldest first
    #[must_use]
    pub fn recent(&self, conversation: &str, limit: usize) -> Vec<HistoryMessage> {
        self.conversations
            .get(conversation)
            .map(|messages| {
                let skip = messages.len().saturating_sub(limit);
                messages.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }
}
