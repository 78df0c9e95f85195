//! Configuration management for the bridge
//!
//! Every setting is resolved as environment variable > TOML file > default.

pub mod file;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

pub use file::{BridgeConfigFile, CONFIG_PATH_ENV, config_file_path, load_config_file};

use crate::commands::CommandTemplates;
use crate::reply::ReplyTiming;
use crate::{Error, Result};

/// Default Graph API base URL
pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// Default webhook server port
pub const DEFAULT_PORT: u16 = 3000;

/// Default requests per minute on the event endpoint
pub const DEFAULT_RATE_LIMIT: u32 = 30;

/// How often the transport session is re-probed
pub const SUPERVISOR_INTERVAL: Duration = Duration::from_secs(60);

/// Bridge configuration
#[derive(Debug)]
pub struct Config {
    /// `WhatsApp` Cloud API transport
    pub whatsapp: WhatsAppConfig,

    /// Home Assistant webhook server
    pub webhook: WebhookConfig,

    /// Reply wait timing
    pub reply: ReplyTiming,

    /// Command templates per action
    pub commands: CommandTemplates,

    /// Logging
    pub logging: LoggingConfig,
}

/// `WhatsApp` Cloud API configuration
#[derive(Debug)]
pub struct WhatsAppConfig {
    /// Phone number of the bot the bridge talks to
    pub bot_number: String,
    /// Cloud API access token
    pub access_token: SecretString,
    /// Business phone number ID used for sending
    pub phone_number_id: String,
    /// Token echoed during webhook subscription
    pub verify_token: Option<SecretString>,
    /// App secret for webhook payload signatures
    pub app_secret: Option<SecretString>,
    /// Graph API base URL
    pub api_base: String,
    /// Messages kept per conversation
    pub history_limit: usize,
}

/// Webhook server configuration
#[derive(Debug)]
pub struct WebhookConfig {
    pub port: u16,
    /// Bearer token Home Assistant must present; `None` disables auth
    pub secret: Option<SecretString>,
    pub rate_limit_per_minute: u32,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    /// Directory for daily-rotated JSON log files
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment and config file
    ///
    /// The file is `path` if given, else `$BRIDGE_CONFIG`, else the default
    /// location.
    ///
    /// # Errors
    ///
    /// Returns error if a required setting is missing, a value does not parse,
    /// a command template is malformed, or the config file is unreadable
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = env_var(CONFIG_PATH_ENV).map(PathBuf::from);
        let path = path.or(env_path.as_deref());
        let file = load_config_file(path)?;
        Self::from_sources(env_var, file)
    }

    /// Resolve configuration from an environment lookup and a parsed file
    ///
    /// # Errors
    ///
    /// See [`Config::load`]
    pub fn from_sources(
        env: impl Fn(&str) -> Option<String>,
        fc: BridgeConfigFile,
    ) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.is_empty());

        // WhatsApp (env > toml, required fields have no default)
        let whatsapp = WhatsAppConfig {
            bot_number: required(
                env("BOT_PHONE_NUMBER").or(fc.whatsapp.bot_number),
                "BOT_PHONE_NUMBER",
            )?,
            access_token: required(
                env("WHATSAPP_TOKEN").or(fc.whatsapp.access_token),
                "WHATSAPP_TOKEN",
            )?
            .into(),
            phone_number_id: required(
                env("WHATSAPP_PHONE_ID").or(fc.whatsapp.phone_number_id),
                "WHATSAPP_PHONE_ID",
            )?,
            verify_token: env("WHATSAPP_VERIFY_TOKEN")
                .or(fc.whatsapp.verify_token)
                .map(SecretString::from),
            app_secret: env("WHATSAPP_APP_SECRET")
                .or(fc.whatsapp.app_secret)
                .map(SecretString::from),
            api_base: env("WHATSAPP_API_BASE")
                .or(fc.whatsapp.api_base)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            history_limit: parse_env(&env, "WHATSAPP_HISTORY_LIMIT")?
                .or(fc.whatsapp.history_limit)
                .unwrap_or(crate::channels::DEFAULT_HISTORY_LIMIT),
        };

        if crate::channels::normalize_number(&whatsapp.bot_number).is_empty() {
            return Err(Error::Config(format!(
                "BOT_PHONE_NUMBER has no digits: {}",
                whatsapp.bot_number
            )));
        }

        // Webhook server (env > toml > default)
        let webhook = WebhookConfig {
            port: parse_env(&env, "WEBHOOK_PORT")?
                .or(fc.webhook.port)
                .unwrap_or(DEFAULT_PORT),
            secret: env("WEBHOOK_SECRET")
                .or(fc.webhook.secret)
                .map(SecretString::from),
            rate_limit_per_minute: parse_env(&env, "WEBHOOK_RATE_LIMIT")?
                .or(fc.webhook.rate_limit)
                .unwrap_or(DEFAULT_RATE_LIMIT),
        };

        // Reply timing
        let defaults = ReplyTiming::default();
        let millis = |key: &str, file: Option<u64>, default: Duration| -> Result<Duration> {
            Ok(parse_env(&env, key)?
                .or(file)
                .map_or(default, Duration::from_millis))
        };
        let reply = ReplyTiming {
            timeout: millis("REPLY_TIMEOUT_MS", fc.reply.timeout_ms, defaults.timeout)?,
            buffer: millis("REPLY_BUFFER_MS", fc.reply.buffer_ms, defaults.buffer)?,
            poll_interval: millis(
                "REPLY_POLL_INTERVAL_MS",
                fc.reply.poll_interval_ms,
                defaults.poll_interval,
            )?,
            reaction_grace: millis(
                "REPLY_REACTION_GRACE_MS",
                fc.reply.reaction_grace_ms,
                defaults.reaction_grace,
            )?,
        };
        if reply.poll_interval.is_zero() {
            return Err(Error::Config(
                "REPLY_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        // Command templates
        let default_commands = CommandTemplates::default();
        let commands = CommandTemplates {
            add: env("CMD_TEMPLATE_ADD")
                .or(fc.commands.add)
                .unwrap_or(default_commands.add),
            remove: env("CMD_TEMPLATE_REMOVE")
                .or(fc.commands.remove)
                .unwrap_or(default_commands.remove),
            bought: env("CMD_TEMPLATE_BOUGHT")
                .or(fc.commands.bought)
                .unwrap_or(default_commands.bought),
            list: env("CMD_TEMPLATE_LIST")
                .or(fc.commands.list)
                .unwrap_or(default_commands.list),
            clear: env("CMD_TEMPLATE_CLEAR")
                .or(fc.commands.clear)
                .unwrap_or(default_commands.clear),
        };
        commands.validate()?;

        let logging = LoggingConfig {
            level: env("LOG_LEVEL")
                .or(fc.logging.level)
                .unwrap_or_else(|| "info".to_string()),
            dir: env("LOG_DIR").or(fc.logging.dir).map(PathBuf::from),
        };

        Ok(Self {
            whatsapp,
            webhook,
            reply,
            commands,
            logging,
        })
    }
}

impl fmt::Display for Config {
    /// Effective configuration with secrets reduced to set/unset
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = |present: bool| if present { "<set>" } else { "<unset>" };

        writeln!(f, "[whatsapp]")?;
        writeln!(f, "bot_number = {}", self.whatsapp.bot_number)?;
        writeln!(f, "access_token = {}", set(true))?;
        writeln!(f, "phone_number_id = {}", self.whatsapp.phone_number_id)?;
        writeln!(f, "verify_token = {}", set(self.whatsapp.verify_token.is_some()))?;
        writeln!(f, "app_secret = {}", set(self.whatsapp.app_secret.is_some()))?;
        writeln!(f, "api_base = {}", self.whatsapp.api_base)?;
        writeln!(f, "history_limit = {}", self.whatsapp.history_limit)?;
        writeln!(f)?;
        writeln!(f, "[webhook]")?;
        writeln!(f, "port = {}", self.webhook.port)?;
        writeln!(f, "secret = {}", set(self.webhook.secret.is_some()))?;
        writeln!(f, "rate_limit = {}", self.webhook.rate_limit_per_minute)?;
        writeln!(f)?;
        writeln!(f, "[reply]")?;
        writeln!(f, "timeout_ms = {}", self.reply.timeout.as_millis())?;
        writeln!(f, "buffer_ms = {}", self.reply.buffer.as_millis())?;
        writeln!(f, "poll_interval_ms = {}", self.reply.poll_interval.as_millis())?;
        writeln!(f, "reaction_grace_ms = {}", self.reply.reaction_grace.as_millis())?;
        writeln!(f)?;
        writeln!(f, "[commands]")?;
        writeln!(f, "add = {}", self.commands.add)?;
        writeln!(f, "remove = {}", self.commands.remove)?;
        writeln!(f, "bought = {}", self.commands.bought)?;
        writeln!(f, "list = {}", self.commands.list)?;
        writeln!(f, "clear = {}", self.commands.clear)?;
        writeln!(f)?;
        writeln!(f, "[logging]")?;
        writeln!(f, "level = {}", self.logging.level)?;
        match &self.logging.dir {
            Some(dir) => write!(f, "dir = {}", dir.display()),
            None => write!(f, "dir = <console only>"),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    value.ok_or_else(|| Error::Config(format!("missing required setting: {key}")))
}

fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}")))
        })
        .transpose()
}
