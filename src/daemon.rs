//! Daemon - the main bridge service
//!
//! Wires the `WhatsApp` transport, the reply correlator and the webhook server
//! together and runs until interrupted.

use std::sync::Arc;

use crate::api::ApiServerBuilder;
use crate::channels::{Channel, WhatsAppChannel};
use crate::config::SUPERVISOR_INTERVAL;
use crate::reply::{ReplyCorrelator, ReplyWatch};
use crate::{Config, Result};

/// The bridge daemon
pub struct Daemon {
    config: Config,
    port: u16,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// `port` overrides the configured webhook port.
    #[must_use]
    pub const fn new(config: Config, port: u16) -> Self {
        Self { config, port }
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the webhook server cannot bind or fails
    pub async fn run(self) -> Result<()> {
        let Self { config, port } = self;

        let watch = ReplyWatch::new();
        let whatsapp = Arc::new(
            WhatsAppChannel::new(&config.whatsapp).with_reaction_sink(Arc::new(watch.clone())),
        );

        tracing::info!(
            port,
            bot = %whatsapp.bot_number(),
            timeout_ms = u64::try_from(config.reply.timeout.as_millis()).unwrap_or(u64::MAX),
            "starting WhatsApp bridge"
        );

        // The gateway starts right away and reports not-ready until connected
        let session = whatsapp.spawn_session(SUPERVISOR_INTERVAL);

        let channel: Arc<dyn Channel> = whatsapp.clone();
        let correlator = Arc::new(ReplyCorrelator::new(
            Arc::clone(&channel),
            whatsapp.bot_number(),
            watch,
            config.reply,
        ));

        let server = ApiServerBuilder::new(correlator, channel, port)
            .whatsapp(Arc::clone(&whatsapp))
            .webhook_secret(config.webhook.secret)
            .commands(config.commands)
            .rate_limit(config.webhook.rate_limit_per_minute)
            .build();

        let result = server.run(shutdown_signal()).await;

        session.abort();
        whatsapp.disconnect();
        tracing::info!("daemon stopped");
        result
    }
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown requested");
}
