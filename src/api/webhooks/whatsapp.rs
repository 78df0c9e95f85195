//! `WhatsApp` Cloud API webhook handler

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::api::ApiState;
use crate::channels::WhatsAppWebhook;

/// Subscription verification query (`hub.*` parameters)
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Answer the webhook subscription challenge
pub async fn verify_subscription(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let Some(whatsapp) = &state.whatsapp else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match whatsapp.verify_subscription(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
    ) {
        Some(challenge) => {
            tracing::info!("WhatsApp webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            tracing::warn!("WhatsApp webhook verification failed");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// Receive messages and reactions from the Cloud API
pub async fn handle_webhook(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(whatsapp) = &state.whatsapp else {
        return StatusCode::NOT_FOUND;
    };

    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok());
    if !whatsapp.verify_payload(&body, signature) {
        tracing::warn!("WhatsApp webhook signature mismatch");
        return StatusCode::FORBIDDEN;
    }

    match serde_json::from_slice::<WhatsAppWebhook>(&body) {
        Ok(payload) => whatsapp.handle_webhook(&payload),
        Err(e) => tracing::warn!(error = %e, "unparseable WhatsApp webhook"),
    }

    // Always acknowledge so the platform does not redeliver
    StatusCode::OK
}
