//! Error types for the `WhatsApp` bridge

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the bridge
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The messaging transport has no live session
    #[error("WhatsApp client not ready")]
    NotReady,

    /// Channel error
    #[error("channel error: {0}")]
    Channel(String),

    /// Invalid request from the automation caller
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the failure came from the transport being disconnected
    #[must_use]
    pub const fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady)
    }
}
