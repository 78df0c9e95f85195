//! Home Assistant event handler
//!
//! Receives `{"action": "...", "item": "..."}`, sends the rendered command to
//! the bot and answers with what the bot said.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

use crate::api::{ApiState, error_response};
use crate::commands::{Action, sanitize_item};
use crate::response::{confirmation_for, to_voice_text};

/// Successful event response
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub ok: bool,
    /// Text for display
    pub message: String,
    /// Same text with formatting stripped for TTS
    pub voice_message: String,
}

/// A validated request
#[derive(Debug, PartialEq, Eq)]
struct EventRequest {
    action: Action,
    item: Option<String>,
}

/// Validate an event body, returning the client-facing error on failure
fn parse_event(body: &[u8]) -> Result<EventRequest, String> {
    let event: Value = serde_json::from_slice(body).map_err(|_| "Invalid JSON".to_string())?;

    let action = event
        .get("action")
        .and_then(Value::as_str)
        .and_then(|a| a.parse::<Action>().ok())
        .ok_or_else(|| "Invalid or missing action".to_string())?;

    let item = match event.get("item") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v) => Some(v),
    };

    if action.requires_item() && item.is_none() {
        return Err(format!("Missing item for action: {action}"));
    }

    let item = match item {
        None => None,
        Some(Value::String(raw)) => Some(
            sanitize_item(raw).ok_or_else(|| "Invalid item (empty or too long)".to_string())?,
        ),
        Some(_) => return Err("Item must be a string".to_string()),
    };

    Ok(EventRequest { action, item })
}

/// Handle a Home Assistant event
pub async fn handle_event(State(state): State<Arc<ApiState>>, body: Bytes) -> Response {
    let request = match parse_event(&body) {
        Ok(request) => request,
        Err(message) => {
            tracing::debug!(error = %message, "rejected Home Assistant event");
            return error_response(StatusCode::BAD_REQUEST, message);
        }
    };

    let command = state
        .commands
        .render(request.action, request.item.as_deref());
    tracing::info!(action = %request.action, command = %command, "received Home Assistant event");

    match state.correlator.send_and_wait_for_reply(&command).await {
        Ok(reply) => {
            let message = confirmation_for(&reply, request.action, request.item.as_deref());
            let voice_message = to_voice_text(&message);
            Json(EventResponse {
                ok: true,
                message,
                voice_message,
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, action = %request.action, "error processing Home Assistant event");
            if e.is_not_ready() {
                error_response(StatusCode::SERVICE_UNAVAILABLE, "WhatsApp not connected")
            } else {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        }
    }
}
