//! Shopping-list actions and the bot commands they render to

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Longest accepted item, in characters
pub const MAX_ITEM_LENGTH: usize = 200;

/// Placeholder substituted with the item in command templates
pub const ITEM_PLACEHOLDER: &str = "{item}";

/// C0/C1 control characters, except tab, LF and CR
static CONTROL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F-\x{9F}]").expect("valid regex")
});

/// An action the automation caller can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Remove,
    Bought,
    List,
    Clear,
}

impl Action {
    /// Whether the action operates on a single item
    #[must_use]
    pub const fn requires_item(self) -> bool {
        matches!(self, Self::Add | Self::Remove | Self::Bought)
    }

    /// Wire name of the action
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Bought => "bought",
            Self::List => "list",
            Self::Clear => "clear",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            "bought" => Ok(Self::Bought),
            "list" => Ok(Self::List),
            "clear" => Ok(Self::Clear),
            other => Err(Error::InvalidRequest(format!("unknown action: {other}"))),
        }
    }
}

/// Clean an item name from the caller
///
/// Strips control characters and surrounding whitespace. Returns `None` if
/// nothing is left or the result is longer than [`MAX_ITEM_LENGTH`].
#[must_use]
pub fn sanitize_item(item: &str) -> Option<String> {
    let cleaned = CONTROL_CHARS.replace_all(item, "");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().count() > MAX_ITEM_LENGTH {
        return None;
    }
    Some(cleaned.to_string())
}

/// Command text templates, one per action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplates {
    pub add: String,
    pub remove: String,
    pub bought: String,
    pub list: String,
    pub clear: String,
}

impl Default for CommandTemplates {
    fn default() -> Self {
        Self {
            add: "הוסף {item}".to_string(),
            remove: "הסר {item}".to_string(),
            bought: "קניתי {item}".to_string(),
            list: "רשימה".to_string(),
            clear: "נקה".to_string(),
        }
    }
}

impl CommandTemplates {
    /// Template for an action
    #[must_use]
    pub fn template(&self, action: Action) -> &str {
        match action {
            Action::Add => &self.add,
            Action::Remove => &self.remove,
            Action::Bought => &self.bought,
            Action::List => &self.list,
            Action::Clear => &self.clear,
        }
    }

    /// Check that every item action has exactly one placeholder
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending template
    pub fn validate(&self) -> Result<()> {
        for action in [Action::Add, Action::Remove, Action::Bought] {
            let count = self.template(action).matches(ITEM_PLACEHOLDER).count();
            if count != 1 {
                return Err(Error::Config(format!(
                    "command template for '{action}' must contain {ITEM_PLACEHOLDER} exactly once (found {count})"
                )));
            }
        }
        Ok(())
    }

    /// Render the command text for an action
    #[must_use]
    pub fn render(&self, action: Action, item: Option<&str>) -> String {
        let template = self.template(action);
        match item {
            Some(item) => template.replacen(ITEM_PLACEHOLDER, item, 1),
            None => template.to_string(),
        }
    }
}
