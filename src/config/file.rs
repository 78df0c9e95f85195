//! TOML configuration file loading
//!
//! Supports `~/.config/whatsapp-bridge/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Environment variable pointing at an alternative config file
pub const CONFIG_PATH_ENV: &str = "BRIDGE_CONFIG";

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfigFile {
    /// `WhatsApp` Cloud API settings
    #[serde(default)]
    pub whatsapp: WhatsAppFileConfig,

    /// Home Assistant webhook server
    #[serde(default)]
    pub webhook: WebhookFileConfig,

    /// Reply wait timing
    #[serde(default)]
    pub reply: ReplyFileConfig,

    /// Command templates
    #[serde(default)]
    pub commands: CommandsFileConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingFileConfig,
}

/// `WhatsApp` Cloud API configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppFileConfig {
    /// Phone number of the shopping-list bot
    pub bot_number: Option<String>,
    pub access_token: Option<String>,
    pub phone_number_id: Option<String>,
    pub verify_token: Option<String>,
    pub app_secret: Option<String>,
    /// Graph API base URL
    pub api_base: Option<String>,
    /// Messages kept per conversation
    pub history_limit: Option<usize>,
}

/// Webhook server configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookFileConfig {
    pub port: Option<u16>,
    /// Bearer token expected from Home Assistant
    pub secret: Option<String>,
    /// Requests per minute on the event endpoint
    pub rate_limit: Option<u32>,
}

/// Reply timing, all in milliseconds
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyFileConfig {
    pub timeout_ms: Option<u64>,
    pub buffer_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub reaction_grace_ms: Option<u64>,
}

/// Command text templates
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandsFileConfig {
    pub add: Option<String>,
    pub remove: Option<String>,
    pub bought: Option<String>,
    pub list: Option<String>,
    pub clear: Option<String>,
}

/// Logging configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingFileConfig {
    /// Filter directive (e.g. "info", "`whatsapp_bridge=debug`")
    pub level: Option<String>,
    /// Directory for JSON log files
    pub dir: Option<String>,
}

/// Parse a config file from a string
///
/// # Errors
///
/// Returns error if the content is not valid TOML for this schema
pub fn parse_config_file(content: &str) -> Result<BridgeConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file
///
/// An explicitly given path must exist. The default path is optional and
/// yields `BridgeConfigFile::default()` when absent.
///
/// # Errors
///
/// Returns error if an explicit file is missing, or any file can't be read or
/// parsed
pub fn load_config_file(explicit: Option<&Path>) -> Result<BridgeConfigFile> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => match config_file_path() {
            Some(path) => (path, false),
            None => return Ok(BridgeConfigFile::default()),
        },
    };

    if !path.exists() {
        if required {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(BridgeConfigFile::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = parse_config_file(&content).map_err(|e| {
        Error::Config(format!("failed to parse {}: {e}", path.display()))
    })?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/whatsapp-bridge/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.config_dir().join("whatsapp-bridge").join("config.toml"))
}
