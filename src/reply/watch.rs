//! Shared correlation slot between the wait loop and the reaction sink

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

use crate::channels::{ReactionEvent, ReactionSink};

/// A reaction matched to the watched message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReaction {
    /// The reaction emoji
    pub emoji: String,
    /// When the reaction was matched; starts the grace window
    pub received_at: Instant,
}

#[derive(Debug, Default)]
struct CorrelationState {
    watched_message_id: Option<String>,
    reaction: Option<PendingReaction>,
}

/// Handle to the single in-flight correlation
///
/// Cloning shares the same slot. The correlator owns the watch lifecycle; the
/// transport only feeds reactions in through [`ReactionSink`].
#[derive(Debug, Clone, Default)]
pub struct ReplyWatch {
    state: Arc<Mutex<CorrelationState>>,
}

impl ReplyWatch {
    /// Create an empty watch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CorrelationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget any watched message and pending reaction
    pub fn reset(&self) {
        *self.lock() = CorrelationState::default();
    }

    /// Start watching `message_id`, replacing any previous watch
    pub fn watch(&self, message_id: &str) {
        let mut state = self.lock();
        state.watched_message_id = Some(message_id.to_string());
        state.reaction = None;
    }

    /// The reaction recorded for `message_id`, if it is still the watched one
    #[must_use]
    pub fn pending_reaction(&self, message_id: &str) -> Option<PendingReaction> {
        let state = self.lock();
        if state.watched_message_id.as_deref() != Some(message_id) {
            return None;
        }
        state.reaction.clone()
    }

    /// Stop watching `message_id`
    ///
    /// Leaves a newer watch untouched. Returns whether anything was cleared.
    pub fn clear(&self, message_id: &str) -> bool {
        let mut state = self.lock();
        if state.watched_message_id.as_deref() != Some(message_id) {
            return false;
        }
        *state = CorrelationState::default();
        true
    }

    /// Whether a message is being watched
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.lock().watched_message_id.is_some()
    }

    /// Identifier of the watched message
    #[must_use]
    pub fn watched_message_id(&self) -> Option<String> {
        self.lock().watched_message_id.clone()
    }
}

impl ReactionSink for ReplyWatch {
    fn on_reaction(&self, event: ReactionEvent) {
        if event.emoji.is_empty() {
            tracing::debug!(target_id = %event.target_message_id, "reaction removed, ignoring");
            return;
        }

        let mut state = self.lock();
        let Some(watched) = state.watched_message_id.as_deref() else {
            tracing::debug!(emoji = %event.emoji, "reaction with no active request");
            return;
        };

        if watched != event.target_message_id {
            tracing::debug!(
                watched = %watched,
                target_id = %event.target_message_id,
                "reaction on another message, ignoring"
            );
            return;
        }

        tracing::info!(emoji = %event.emoji, sender_id = %event.sender_id, "bot reacted to command");
        state.reaction = Some(PendingReaction {
            emoji: event.emoji,
            received_at: Instant::now(),
        });
    }
}
