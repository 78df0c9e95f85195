//! Send a command and wait for the bot's answer

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::{Reply, ReplyWatch};
use crate::Result;
use crate::channels::{Channel, HistoryMessage};

/// Messages fetched on each poll
const RECENT_LIMIT: usize = 5;

/// Messages fetched after the buffer, to pick up multi-message replies
const BURST_LIMIT: usize = 10;

/// Timing knobs of the wait loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTiming {
    /// Give up after this long
    pub timeout: Duration,
    /// Wait this long after the first reply message before collecting
    pub buffer: Duration,
    /// Delay between history polls
    pub poll_interval: Duration,
    /// How long text may still replace a reaction
    pub reaction_grace: Duration,
}

impl Default for ReplyTiming {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            buffer: Duration::from_millis(1500),
            poll_interval: Duration::from_secs(2),
            reaction_grace: Duration::from_secs(4),
        }
    }
}

/// Clears the watch when the request ends, however it ends
struct WatchGuard {
    watch: ReplyWatch,
    message_id: String,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if self.watch.clear(&self.message_id) {
            tracing::debug!(msg_id = %self.message_id, "watch cleared");
        }
    }
}

/// Correlates one outgoing command with the bot's reply
pub struct ReplyCorrelator {
    channel: Arc<dyn Channel>,
    conversation: String,
    watch: ReplyWatch,
    timing: ReplyTiming,
}

impl ReplyCorrelator {
    /// Create a correlator talking to `conversation` over `channel`
    ///
    /// `watch` must be the same handle the channel delivers reactions to.
    #[must_use]
    pub fn new(
        channel: Arc<dyn Channel>,
        conversation: impl Into<String>,
        watch: ReplyWatch,
        timing: ReplyTiming,
    ) -> Self {
        Self {
            channel,
            conversation: conversation.into(),
            watch,
            timing,
        }
    }

    /// The shared correlation slot
    #[must_use]
    pub const fn watch(&self) -> &ReplyWatch {
        &self.watch
    }

    /// Send `command` to the bot and wait for its reply
    ///
    /// Running out of time is not an error; it yields [`Reply::Timeout`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotReady`] if the transport is disconnected, or
    /// the transport error if the send failed
    pub async fn send_and_wait_for_reply(&self, command: &str) -> Result<Reply> {
        self.watch.reset();

        let sent_at = Utc::now();
        let sent = self.channel.send(&self.conversation, command).await?;
        self.watch.watch(&sent.id);
        let _guard = WatchGuard {
            watch: self.watch.clone(),
            message_id: sent.id.clone(),
        };

        tracing::info!(msg_id = %sent.id, "command sent, waiting for reply");
        let deadline = Instant::now() + self.timing.timeout;

        while Instant::now() < deadline {
            tokio::time::sleep(self.timing.poll_interval).await;

            if !self.replies_since(sent_at, RECENT_LIMIT).await.is_empty() {
                tokio::time::sleep(self.timing.buffer).await;
                let messages = self.replies_since(sent_at, BURST_LIMIT).await;
                let reply = Reply::from_bodies(messages.iter().map(|m| m.body.as_str()));
                tracing::info!(messages = messages.len(), "bot replied with text");
                return Ok(reply);
            }

            if let Some(reaction) = self.watch.pending_reaction(&sent.id)
                && Instant::now() >= reaction.received_at + self.timing.reaction_grace
            {
                tracing::info!(emoji = %reaction.emoji, "bot replied with reaction");
                return Ok(Reply::Reaction(reaction.emoji));
            }
        }

        if let Some(reaction) = self.watch.pending_reaction(&sent.id) {
            tracing::info!(emoji = %reaction.emoji, "timed out with reaction only");
            return Ok(Reply::Reaction(reaction.emoji));
        }

        tracing::warn!(
            msg_id = %sent.id,
            timeout_ms = u64::try_from(self.timing.timeout.as_millis()).unwrap_or(u64::MAX),
            "no reply from bot"
        );
        Ok(Reply::Timeout)
    }

    /// Bot messages newer than `since` among the last `limit`
    ///
    /// Fetch failures count as "nothing yet".
    async fn replies_since(&self, since: DateTime<Utc>, limit: usize) -> Vec<HistoryMessage> {
        match self
            .channel
            .fetch_recent_messages(&self.conversation, limit)
            .await
        {
            Ok(messages) => messages
                .into_iter()
                .filter(|m| !m.author_is_self && m.timestamp > since)
                .collect(),
            Err(e) => {
                tracing::debug!(error = %e, "failed to fetch recent messages");
                Vec::new()
            }
        }
    }
}
