//! `WhatsApp` channel adapter
//!
//! Uses the `WhatsApp` Cloud API for sending. Incoming messages and reactions
//! arrive through the Cloud API webhook, which the HTTP layer hands to
//! [`WhatsAppChannel::handle_webhook`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tokio::task::JoinHandle;

use super::retry::{self, RetryPolicy};
use super::{Channel, HistoryMessage, MessageHistory, ReactionEvent, ReactionSink, SentMessage};
use crate::config::WhatsAppConfig;
use crate::security::constant_time_eq;
use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Why a session probe failed
enum ProbeFailure {
    /// Network trouble, rate limiting or a server error
    Transient(String),
    /// Bad credentials or phone number id
    Fatal(String),
}

/// `WhatsApp` channel adapter
pub struct WhatsAppChannel {
    /// `WhatsApp` Cloud API access token
    access_token: SecretString,
    /// Phone number ID for sending messages
    phone_number_id: String,
    /// Bot phone number, digits only
    bot_number: String,
    /// Graph API base URL, without trailing slash
    api_base: String,
    /// Webhook subscription verify token
    verify_token: Option<SecretString>,
    /// App secret for webhook payload signatures
    app_secret: Option<SecretString>,
    client: Client,
    history: Mutex<MessageHistory>,
    reaction_sink: Option<Arc<dyn ReactionSink>>,
    ready: AtomicBool,
    retry: RetryPolicy,
}

impl WhatsAppChannel {
    /// Create a new `WhatsApp` channel adapter
    #[must_use]
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            access_token: SecretString::from(config.access_token.expose_secret().to_owned()),
            phone_number_id: config.phone_number_id.clone(),
            bot_number: normalize_number(&config.bot_number),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            verify_token: config
                .verify_token
                .as_ref()
                .map(|t| SecretString::from(t.expose_secret().to_owned())),
            app_secret: config
                .app_secret
                .as_ref()
                .map(|s| SecretString::from(s.expose_secret().to_owned())),
            client: Client::new(),
            history: Mutex::new(MessageHistory::new(config.history_limit)),
            reaction_sink: None,
            ready: AtomicBool::new(false),
            retry: RetryPolicy::default(),
        }
    }

    /// Deliver reaction events to the given sink
    #[must_use]
    pub fn with_reaction_sink(mut self, sink: Arc<dyn ReactionSink>) -> Self {
        self.reaction_sink = Some(sink);
        self
    }

    /// Override the reconnect backoff policy
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// The bot conversation this channel talks to (digits only)
    #[must_use]
    pub fn bot_number(&self) -> &str {
        &self.bot_number
    }

    fn history(&self) -> MutexGuard<'_, MessageHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Establish the session, retrying transient failures with backoff
    ///
    /// The Cloud API is stateless; "connected" means the credentials were
    /// accepted by a probe of the phone number resource.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is incomplete, the credentials are
    /// rejected, or every attempt failed
    pub async fn connect(&self) -> Result<()> {
        if self.access_token.expose_secret().is_empty() {
            return Err(Error::Channel("WhatsApp access token required".to_string()));
        }
        if self.phone_number_id.is_empty() {
            return Err(Error::Channel("WhatsApp phone number ID required".to_string()));
        }
        if self.bot_number.is_empty() {
            return Err(Error::Channel("bot phone number required".to_string()));
        }

        for attempt in 0..self.retry.max_attempts {
            match self.probe().await {
                Ok(()) => {
                    self.ready.store(true, Ordering::SeqCst);
                    tracing::info!(attempt = attempt + 1, "WhatsApp channel connected");
                    return Ok(());
                }
                Err(ProbeFailure::Fatal(reason)) => {
                    self.ready.store(false, Ordering::SeqCst);
                    return Err(Error::Channel(reason));
                }
                Err(ProbeFailure::Transient(reason)) => {
                    let delay = retry::delay_for_attempt(&self.retry, attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        reason = %reason,
                        "WhatsApp connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        self.ready.store(false, Ordering::SeqCst);
        Err(Error::Channel(format!(
            "max reconnection attempts ({}) reached, manual intervention required",
            self.retry.max_attempts
        )))
    }

    /// Mark the session as closed
    pub fn disconnect(&self) {
        self.ready.store(false, Ordering::SeqCst);
        tracing::info!("WhatsApp channel disconnected");
    }

    /// Spawn the session task: connect, then re-probe every `interval`
    ///
    /// A failed probe marks the channel not ready and reconnects with backoff.
    /// When the backoff gives up, the next tick tries again.
    pub fn spawn_session(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let channel = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = channel.connect().await {
                tracing::error!(error = %e, "WhatsApp connect failed");
            }

            loop {
                tokio::time::sleep(interval).await;

                match channel.probe().await {
                    Ok(()) => {
                        if !channel.ready.swap(true, Ordering::SeqCst) {
                            tracing::info!("WhatsApp session restored");
                        }
                    }
                    Err(ProbeFailure::Transient(reason) | ProbeFailure::Fatal(reason)) => {
                        channel.ready.store(false, Ordering::SeqCst);
                        tracing::warn!(reason = %reason, "WhatsApp session lost, reconnecting");
                        if let Err(e) = channel.connect().await {
                            tracing::error!(error = %e, "WhatsApp reconnection failed");
                        }
                    }
                }
            }
        })
    }

    /// Check that the Graph API accepts our token for the phone number
    async fn probe(&self) -> std::result::Result<(), ProbeFailure> {
        let url = format!("{}/{}", self.api_base, self.phone_number_id);
        let response = self
            .client
            .get(&url)
            .query(&[("fields", "id")])
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| ProbeFailure::Transient(format!("WhatsApp API error: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let reason = format!("WhatsApp API error: {status} - {body}");
        if retry::is_recoverable(status.as_u16()) {
            Err(ProbeFailure::Transient(reason))
        } else {
            Err(ProbeFailure::Fatal(reason))
        }
    }

    /// Answer a webhook subscription challenge
    ///
    /// Returns `Some(challenge)` if the verify token matches.
    #[must_use]
    pub fn verify_subscription(
        &self,
        mode: Option<&str>,
        token: Option<&str>,
        challenge: Option<&str>,
    ) -> Option<String> {
        let expected = self.verify_token.as_ref()?;
        verify_webhook_subscription(mode, token, challenge, expected.expose_secret())
    }

    /// Check a webhook payload signature
    ///
    /// Always passes when no app secret is configured.
    #[must_use]
    pub fn verify_payload(&self, body: &[u8], signature_header: Option<&str>) -> bool {
        let Some(secret) = &self.app_secret else {
            return true;
        };
        signature_header.is_some_and(|sig| verify_signature(body, sig, secret.expose_secret()))
    }

    /// Process an incoming `WhatsApp` webhook event
    ///
    /// Messages from the bot are recorded in the history; reactions are
    /// forwarded to the reaction sink. Traffic from anyone else is ignored.
    pub fn handle_webhook(&self, payload: &WhatsAppWebhook) {
        for entry in &payload.entry {
            for change in &entry.changes {
                if change.field.as_deref().is_some_and(|f| f != "messages") {
                    tracing::debug!(field = ?change.field, "ignoring non-message webhook");
                    continue;
                }

                let value = &change.value;
                if let Some(metadata) = &value.metadata
                    && metadata.phone_number_id != self.phone_number_id
                {
                    tracing::warn!(
                        expected = %self.phone_number_id,
                        received = %metadata.phone_number_id,
                        "phone number ID mismatch"
                    );
                    continue;
                }

                for msg in value.messages.iter().flatten() {
                    if normalize_number(&msg.from) != self.bot_number {
                        tracing::debug!(from = %msg.from, "ignoring message outside the bot chat");
                        continue;
                    }

                    if msg.message_type == "reaction" {
                        self.forward_reaction(msg);
                    } else {
                        self.record_incoming(msg);
                    }
                }
            }
        }
    }

    /// Stickers, audio and uncaptioned media still count as a reply; their
    /// body is empty
    fn record_incoming(&self, msg: &WhatsAppMessage) {
        let body = msg.body().unwrap_or_default();
        if body.is_empty() {
            tracing::debug!(msg_type = %msg.message_type, "bot message without text");
        }

        let message = HistoryMessage {
            id: msg.id.clone(),
            author_is_self: false,
            body: body.to_string(),
            timestamp: Utc::now(),
        };

        if self.history().record(&self.bot_number, message) {
            tracing::debug!(msg_id = %msg.id, "bot message received");
        } else {
            tracing::debug!(msg_id = %msg.id, "duplicate webhook delivery");
        }
    }

    fn forward_reaction(&self, msg: &WhatsAppMessage) {
        let Some(reaction) = &msg.reaction else {
            tracing::debug!(msg_id = %msg.id, "reaction message without payload");
            return;
        };

        let event = ReactionEvent {
            emoji: reaction.emoji.clone().unwrap_or_default(),
            sender_id: msg.from.clone(),
            timestamp: parse_timestamp(&msg.timestamp),
            target_message_id: reaction.message_id.clone(),
        };

        tracing::debug!(
            emoji = %event.emoji,
            sender_id = %event.sender_id,
            target_id = %event.target_message_id,
            "reaction event received"
        );

        let Some(sink) = &self.reaction_sink else {
            return;
        };

        if catch_unwind(AssertUnwindSafe(|| sink.on_reaction(event))).is_err() {
            tracing::error!(msg_id = %msg.id, "reaction handler panicked");
        }
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send(&self, conversation: &str, text: &str) -> Result<SentMessage> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }

        let to = normalize_number(conversation);
        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": {
                "body": text,
                "preview_url": false
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("WhatsApp API error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "WhatsApp API error: {status} - {body}"
            )));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| Error::Channel(format!("WhatsApp API response: {e}")))?;
        let id = sent
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| Error::Channel("WhatsApp API returned no message id".to_string()))?;

        self.history().record(
            &to,
            HistoryMessage {
                id: id.clone(),
                author_is_self: true,
                body: text.to_string(),
                timestamp: Utc::now(),
            },
        );

        tracing::debug!(msg_id = %id, "message sent to bot");
        Ok(SentMessage { id })
    }

    async fn fetch_recent_messages(
        &self,
        conversation: &str,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        Ok(self.history().recent(&normalize_number(conversation), limit))
    }
}

/// Strip everything but digits from a phone number or chat id
///
/// Accepts `+972 50-123-4567` as well as `972501234567@c.us`.
#[must_use]
pub fn normalize_number(number: &str) -> String {
    let digits = number.split('@').next().unwrap_or_default();
    digits.chars().filter(char::is_ascii_digit).collect()
}

/// Parse a Cloud API timestamp (seconds since the epoch)
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

/// Verify the webhook signature from `WhatsApp`.
///
/// The signature is sent in the `X-Hub-Signature-256` header as `sha256=<hex>`.
#[must_use]
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let Some(expected) = signature_header.strip_prefix("sha256=") else {
        tracing::warn!("invalid signature header format (missing sha256= prefix)");
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        tracing::warn!("failed to create HMAC");
        return false;
    };

    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(computed.as_bytes(), expected.as_bytes())
}

/// Verify a webhook subscription request
///
/// `WhatsApp` sends a GET request with `hub.mode=subscribe`,
/// `hub.verify_token` and `hub.challenge`. Returns `Some(challenge)` if
/// verification succeeds.
#[must_use]
pub fn verify_webhook_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: &str,
) -> Option<String> {
    let mode = mode?;
    let token = token?;
    let challenge = challenge?;

    if mode == "subscribe" && constant_time_eq(token.as_bytes(), expected_token.as_bytes()) {
        Some(challenge.to_string())
    } else {
        None
    }
}

/// Response from the Cloud API messages endpoint
#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SendResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct SendResponseMessage {
    id: String,
}

/// `WhatsApp` webhook payload from Cloud API
#[derive(Debug, Deserialize)]
pub struct WhatsAppWebhook {
    /// Webhook entries
    #[serde(default)]
    pub entry: Vec<WhatsAppWebhookEntry>,
}

/// `WhatsApp` webhook entry
#[derive(Debug, Deserialize)]
pub struct WhatsAppWebhookEntry {
    /// Changes in this entry
    #[serde(default)]
    pub changes: Vec<WhatsAppWebhookChange>,
}

/// `WhatsApp` webhook change
#[derive(Debug, Deserialize)]
pub struct WhatsAppWebhookChange {
    /// Subscribed field that changed (`messages` for chat traffic)
    pub field: Option<String>,
    /// The change value
    pub value: WhatsAppWebhookValue,
}

/// `WhatsApp` webhook value containing messages
#[derive(Debug, Deserialize)]
pub struct WhatsAppWebhookValue {
    /// Receiving business number
    pub metadata: Option<WhatsAppMetadata>,
    /// Incoming messages (if any)
    pub messages: Option<Vec<WhatsAppMessage>>,
}

/// Business number the webhook was delivered for
#[derive(Debug, Deserialize)]
pub struct WhatsAppMetadata {
    /// Phone number ID
    pub phone_number_id: String,
}

/// `WhatsApp` message
#[derive(Debug, Deserialize)]
pub struct WhatsAppMessage {
    /// Sender phone number
    pub from: String,
    /// Message ID
    pub id: String,
    /// Message timestamp (seconds since the epoch, as a string)
    #[serde(default)]
    pub timestamp: String,
    /// Message type
    #[serde(rename = "type")]
    pub message_type: String,
    /// Text content (for text messages)
    pub text: Option<WhatsAppTextContent>,
    /// Image content
    pub image: Option<WhatsAppMedia>,
    /// Video content
    pub video: Option<WhatsAppMedia>,
    /// Document content
    pub document: Option<WhatsAppMedia>,
    /// Reaction content
    pub reaction: Option<WhatsAppReaction>,
}

impl WhatsAppMessage {
    /// Text body, falling back to a media caption
    fn body(&self) -> Option<&str> {
        self.text
            .as_ref()
            .map(|t| t.body.as_str())
            .or_else(|| {
                [&self.image, &self.video, &self.document]
                    .into_iter()
                    .flatten()
                    .find_map(|m| m.caption.as_deref())
            })
    }
}

/// `WhatsApp` media object (image, video, document)
#[derive(Debug, Deserialize)]
pub struct WhatsAppMedia {
    /// Media ID
    pub id: String,
    /// Caption
    pub caption: Option<String>,
}

/// `WhatsApp` reaction content
#[derive(Debug, Deserialize)]
pub struct WhatsAppReaction {
    /// ID of the message being reacted to
    pub message_id: String,
    /// Reaction emoji; absent or empty when the reaction was removed
    pub emoji: Option<String>,
}

/// `WhatsApp` text message content
#[derive(Debug, Deserialize)]
pub struct WhatsAppTextContent {
    /// Message body
    pub body: String,
}
