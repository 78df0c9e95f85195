//! Turn bot replies into caller-facing text

use std::sync::LazyLock;

use regex::Regex;

use crate::commands::Action;
use crate::reply::Reply;

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Message for the caller
///
/// A bare reaction says nothing useful out loud, so for item actions and
/// `clear` it becomes a confirmation of what was done. Text and sentinels
/// pass through.
#[must_use]
pub fn confirmation_for(reply: &Reply, action: Action, item: Option<&str>) -> String {
    if !reply.is_reaction() {
        return reply.to_string();
    }

    let item_text = item.map(|i| format!(" {i}")).unwrap_or_default();
    match action {
        Action::Add => format!("הפריט{item_text} נוסף לרשימה"),
        Action::Remove => format!("הפריט{item_text} הוסר מהרשימה"),
        Action::Bought => format!("הפריט{item_text} סומן כנקנה"),
        Action::Clear => "הרשימה נוקתה".to_string(),
        Action::List => reply.to_string(),
    }
}

/// Strip `WhatsApp` formatting for text-to-speech
///
/// Drops code blocks and the `*`, `~`, `_` and backtick markers, turns line
/// breaks into sentence breaks and collapses whitespace.
#[must_use]
pub fn to_voice_text(message: &str) -> String {
    let text = CODE_BLOCK.replace_all(message, "");
    let text: String = text
        .chars()
        .filter(|c| !matches!(c, '*' | '~' | '_' | '`'))
        .collect();
    let text = text.replace('\n', ". ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_becomes_confirmation() {
        let reply = Reply::Reaction("👍".to_string());
        assert_eq!(
            confirmation_for(&reply, Action::Add, Some("מלח")),
            "הפריט מלח נוסף לרשימה"
        );
        assert_eq!(
            confirmation_for(&reply, Action::Remove, Some("מלח")),
            "הפריט מלח הוסר מהרשימה"
        );
        assert_eq!(
            confirmation_for(&reply, Action::Bought, Some("חלב")),
            "הפריט חלב סומן כנקנה"
        );
        assert_eq!(confirmation_for(&reply, Action::Clear, None), "הרשימה נוקתה");
    }

    #[test]
    fn list_keeps_reaction_text() {
        let reply = Reply::Reaction("👍".to_string());
        assert_eq!(
            confirmation_for(&reply, Action::List, None),
            "הבוט הגיב: 👍 אישור"
        );
    }

    #[test]
    fn text_and_timeout_pass_through() {
        let text = Reply::Text("נוסף".to_string());
        assert_eq!(confirmation_for(&text, Action::Add, Some("מלח")), "נוסף");

        assert_eq!(
            confirmation_for(&Reply::Timeout, Action::Add, Some("מלח")),
            "הבוט לא הגיב. נסה שוב מאוחר יותר."
        );
    }

    #[test]
    fn voice_text_strips_markup() {
        assert_eq!(
            to_voice_text("*הרשימה:*\n- _חלב_\n- ~לחם~"),
            "הרשימה:. - חלב. - לחם"
        );
    }

    #[test]
    fn voice_text_drops_code_blocks() {
        assert_eq!(to_voice_text("לפני ```\nקוד\n``` אחרי `x`"), "לפני אחרי x");
    }

    #[test]
    fn voice_text_collapses_whitespace() {
        assert_eq!(to_voice_text("  a \t  b  "), "a b");
        assert_eq!(to_voice_text(""), "");
    }
}
