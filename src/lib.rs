//! `WhatsApp` bridge - Home Assistant to `WhatsApp` bot gateway
//!
//! Home Assistant posts a shopping-list action; the bridge sends the matching
//! command to a `WhatsApp` bot, waits for the bot to answer with text or an
//! emoji reaction, and returns one spoken-friendly reply.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  POST /webhook/ha-event   ┌──────────────────────┐
//! │  Home Assistant  │ ────────────────────────▶ │   api (gateway)      │
//! └──────────────────┘                           └──────────┬───────────┘
//!                                                           │
//!                                                ┌──────────▼───────────┐
//!                                                │  reply (correlator)  │◀─┐
//!                                                └──────────┬───────────┘  │ reactions
//!                                                           │ send / fetch │
//!                                                ┌──────────▼───────────┐  │
//!                                                │ channels (WhatsApp)  │──┘
//!                                                └──────────────────────┘
//! ```

pub mod api;
pub mod channels;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod reply;
pub mod response;
pub mod security;

pub use channels::{Channel, HistoryMessage, ReactionEvent, ReactionSink, SentMessage};
pub use commands::{Action, CommandTemplates};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use reply::{Reply, ReplyCorrelator, ReplyTiming, ReplyWatch};
