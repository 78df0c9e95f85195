//! HTTP API server for the bridge

pub mod auth;
pub mod health;
pub mod rate_limit;
pub mod webhooks;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::channels::{Channel, WhatsAppChannel};
use crate::commands::CommandTemplates;
use crate::config::DEFAULT_RATE_LIMIT;
use crate::reply::ReplyCorrelator;

/// Largest accepted Home Assistant event body
pub const MAX_EVENT_BODY_BYTES: usize = 10 * 1024;

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Build a JSON error response
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Shared state for API handlers
pub struct ApiState {
    pub correlator: Arc<ReplyCorrelator>,
    /// Transport the correlator sends through
    pub channel: Arc<dyn Channel>,
    /// Cloud API channel, for its inbound webhook
    pub whatsapp: Option<Arc<WhatsAppChannel>>,
    pub webhook_secret: Option<auth::SecretDigest>,
    pub commands: CommandTemplates,
    pub rate_limiter: rate_limit::SharedLimiter,
    pub started_at: Instant,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    correlator: Arc<ReplyCorrelator>,
    channel: Arc<dyn Channel>,
    whatsapp: Option<Arc<WhatsAppChannel>>,
    webhook_secret: Option<SecretString>,
    commands: CommandTemplates,
    port: u16,
    rate_limit_per_minute: u32,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(correlator: Arc<ReplyCorrelator>, channel: Arc<dyn Channel>, port: u16) -> Self {
        Self {
            correlator,
            channel,
            whatsapp: None,
            webhook_secret: None,
            commands: CommandTemplates::default(),
            port,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT,
        }
    }

    /// Accept Cloud API webhooks for this channel
    #[must_use]
    pub fn whatsapp(mut self, channel: Arc<WhatsAppChannel>) -> Self {
        self.whatsapp = Some(channel);
        self
    }

    /// Set the bearer token Home Assistant must present
    #[must_use]
    pub fn webhook_secret(mut self, secret: Option<SecretString>) -> Self {
        self.webhook_secret = secret;
        self
    }

    /// Set the command templates
    #[must_use]
    pub fn commands(mut self, commands: CommandTemplates) -> Self {
        self.commands = commands;
        self
    }

    /// Set the event endpoint rate limit
    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: u32) -> Self {
        self.rate_limit_per_minute = requests_per_minute;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        if self.webhook_secret.is_none() {
            tracing::warn!("WEBHOOK_SECRET not configured - event endpoint is unauthenticated");
        }

        let state = Arc::new(ApiState {
            correlator: self.correlator,
            channel: self.channel,
            whatsapp: self.whatsapp,
            webhook_secret: self.webhook_secret.as_ref().map(auth::SecretDigest::new),
            commands: self.commands,
            rate_limiter: rate_limit::create_limiter(self.rate_limit_per_minute),
            started_at: Instant::now(),
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let events = post(webhooks::home_assistant::handle_event)
            .layer(DefaultBodyLimit::max(MAX_EVENT_BODY_BYTES))
            .route_layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                auth::require_webhook_secret,
            ))
            .route_layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                rate_limit::rate_limit_middleware,
            ));

        Router::new()
            .route("/webhook/ha-event", events)
            .route(
                "/webhooks/whatsapp",
                get(webhooks::whatsapp::verify_subscription)
                    .post(webhooks::whatsapp::handle_webhook),
            )
            .route("/health", get(health::health))
            .route("/ready", get(health::ready))
            .with_state(self.state.clone())
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::REFERRER_POLICY,
                HeaderValue::from_static("no-referrer"),
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server until `shutdown` completes
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            crate::Error::Config(format!("failed to bind port {}: {e}", self.port))
        })?;

        tracing::info!(port = self.port, "webhook server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        tracing::info!("webhook server stopped");
        Ok(())
    }
}
