//! Structured logging setup using `tracing-subscriber` and `tracing-appender`
//!
//! Human-readable output always goes to stderr. With a log directory, JSON
//! logs are also written to `{dir}/whatsapp-bridge.log.YYYY-MM-DD`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{Error, Result};

/// Keeps the file writer alive; dropping it flushes pending entries
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
}

/// Pick the filter directive
///
/// `rust_log` (the `RUST_LOG` value) wins, then the `-v` count, then the
/// configured level.
#[must_use]
pub fn filter_directive(rust_log: Option<&str>, verbose: u8, level: &str) -> String {
    if let Some(directive) = rust_log.filter(|d| !d.is_empty()) {
        return directive.to_string();
    }

    match verbose {
        0 => level.to_string(),
        1 => "info,whatsapp_bridge=debug".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Initialise logging for the daemon
///
/// # Errors
///
/// Returns an error if the directive is invalid or the log directory cannot
/// be created
pub fn init(directive: &str, dir: Option<&Path>) -> Result<LoggingGuard> {
    let env_filter = EnvFilter::try_new(directive)
        .map_err(|e| Error::Config(format!("invalid log filter '{directive}': {e}")))?;

    let Some(dir) = dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(LoggingGuard { _guard: None });
    };

    std::fs::create_dir_all(dir).map_err(|e| {
        Error::Config(format!(
            "failed to create logs directory {}: {e}",
            dir.display()
        ))
    })?;

    let file_appender = tracing_appender::rolling::daily(dir, "whatsapp-bridge.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(LoggingGuard {
        _guard: Some(guard),
    })
}

/// Initialise minimal console logging for one-shot subcommands
pub fn init_cli() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
