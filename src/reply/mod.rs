//! Reply reconciliation
//!
//! Sends a command to the remote bot and waits for whatever it answers with:
//! a text message, an emoji reaction on the command, both, or nothing. Each
//! request resolves to exactly one [`Reply`].

mod correlator;
mod labels;
mod watch;

use std::fmt;

pub use correlator::{ReplyCorrelator, ReplyTiming};
pub use labels::reaction_label;
pub use watch::{PendingReaction, ReplyWatch};

/// Returned when the bot did not answer before the deadline
pub const NO_REPLY_MESSAGE: &str = "הבוט לא הגיב. נסה שוב מאוחר יותר.";

/// Returned when the bot answered with only whitespace
pub const EMPTY_REPLY_MESSAGE: &str = "הבוט הגיב אבל ההודעה ריקה.";

/// Prefix of the rendered reaction reply
pub const REACTION_PREFIX: &str = "הבוט הגיב:";

/// Outcome of one command round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The bot answered with text (message bodies joined by newlines)
    Text(String),
    /// The bot answered, but every message was blank
    EmptyText,
    /// The bot only reacted to the command with this emoji
    Reaction(String),
    /// Nothing arrived in time
    Timeout,
}

impl Reply {
    /// Build a text reply from message bodies in arrival order
    ///
    /// Bodies are trimmed and blank ones dropped.
    pub fn from_bodies<'a>(bodies: impl IntoIterator<Item = &'a str>) -> Self {
        let joined = bodies
            .into_iter()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if joined.is_empty() {
            Self::EmptyText
        } else {
            Self::Text(joined)
        }
    }

    /// Whether the bot only reacted
    #[must_use]
    pub const fn is_reaction(&self) -> bool {
        matches!(self, Self::Reaction(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::EmptyText => f.write_str(EMPTY_REPLY_MESSAGE),
            Self::Reaction(emoji) => {
                write!(f, "{REACTION_PREFIX} {emoji} {}", reaction_label(emoji))
            }
            Self::Timeout => f.write_str(NO_REPLY_MESSAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bodies_joins_trimmed_lines() {
        let reply = Reply::from_bodies(["  נוסף ", "", "  ", "הרשימה עודכנה"]);
        assert_eq!(reply, Reply::Text("נוסף\nהרשימה עודכנה".to_string()));
    }

    #[test]
    fn from_bodies_all_blank_is_empty() {
        assert_eq!(Reply::from_bodies(["  ", "\n"]), Reply::EmptyText);
        assert_eq!(Reply::from_bodies(std::iter::empty()), Reply::EmptyText);
    }

    #[test]
    fn renders_sentinels() {
        assert_eq!(Reply::Timeout.to_string(), NO_REPLY_MESSAGE);
        assert_eq!(Reply::EmptyText.to_string(), EMPTY_REPLY_MESSAGE);
    }

    #[test]
    fn renders_reaction_with_label() {
        assert_eq!(
            Reply::Reaction("👍".to_string()).to_string(),
            "הבוט הגיב: 👍 אישור"
        );
        assert_eq!(
            Reply::Reaction("🎉".to_string()).to_string(),
            "הבוט הגיב: 🎉 🎉"
        );
    }
}
