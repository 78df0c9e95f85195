//! Shared test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use whatsapp_bridge::api::ApiServerBuilder;
use whatsapp_bridge::{
    Channel, Error, HistoryMessage, ReactionEvent, ReactionSink, ReplyCorrelator, ReplyTiming,
    ReplyWatch, Result, SentMessage,
};

/// Bot conversation used in tests
pub const BOT: &str = "972501234567";

/// Webhook secret used in tests
pub const SECRET: &str = "test-secret";

/// How the fake bot answers a command
#[derive(Debug, Clone)]
pub enum BotBehavior {
    Silent,
    Text(String),
    Reaction(String),
}

/// In-memory transport with a scripted bot on the other end
pub struct MockChannel {
    ready: AtomicBool,
    behavior: Mutex<BotBehavior>,
    sink: ReplyWatch,
    history: Arc<Mutex<Vec<HistoryMessage>>>,
    sent: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl MockChannel {
    pub fn new(behavior: BotBehavior, sink: ReplyWatch) -> Self {
        Self {
            ready: AtomicBool::new(true),
            behavior: Mutex::new(behavior),
            sink,
            history: Arc::new(Mutex::new(Vec::new())),
            sent: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Commands sent so far
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send(&self, _conversation: &str, text: &str) -> Result<SentMessage> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }

        let id = format!("sent-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.sent.lock().unwrap().push(text.to_string());

        // The bot answers a second later
        let behavior = self.behavior.lock().unwrap().clone();
        let history = Arc::clone(&self.history);
        let sink = self.sink.clone();
        let target = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            match behavior {
                BotBehavior::Silent => {}
                BotBehavior::Text(body) => {
                    let mut history = history.lock().unwrap();
                    let id = format!("in-{}", history.len());
                    history.push(HistoryMessage {
                        id,
                        author_is_self: false,
                        body,
                        timestamp: Utc::now() + chrono::Duration::milliseconds(1),
                    });
                }
                BotBehavior::Reaction(emoji) => sink.on_reaction(ReactionEvent {
                    emoji,
                    sender_id: BOT.to_string(),
                    timestamp: Utc::now(),
                    target_message_id: target,
                }),
            }
        });

        Ok(SentMessage { id })
    }

    async fn fetch_recent_messages(
        &self,
        _conversation: &str,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        let history = self.history.lock().unwrap();
        let skip = history.len().saturating_sub(limit);
        Ok(history.iter().skip(skip).cloned().collect())
    }
}

/// Build a router backed by a mock bot
pub fn test_app(behavior: BotBehavior) -> (axum::Router, Arc<MockChannel>) {
    test_app_with(behavior, Some(SECRET), 30)
}

/// Build a router with explicit auth and rate limit settings
pub fn test_app_with(
    behavior: BotBehavior,
    secret: Option<&str>,
    rate_limit: u32,
) -> (axum::Router, Arc<MockChannel>) {
    let watch = ReplyWatch::new();
    let channel = Arc::new(MockChannel::new(behavior, watch.clone()));
    let correlator = Arc::new(ReplyCorrelator::new(
        channel.clone(),
        BOT,
        watch,
        ReplyTiming::default(),
    ));

    let server = ApiServerBuilder::new(correlator, channel.clone(), 0)
        .webhook_secret(secret.map(|s| s.to_string().into()))
        .rate_limit(rate_limit)
        .build();

    (server.router(), channel)
}
