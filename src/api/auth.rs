//! Bearer token authentication middleware

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use super::{ApiState, error_response};
use crate::security::constant_time_eq;

/// SHA-256 digest of the configured webhook secret
///
/// Comparing fixed-size digests keeps the check constant-time and hides the
/// secret's length.
pub struct SecretDigest([u8; 32]);

impl SecretDigest {
    /// Digest a secret
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        Self(Sha256::digest(secret.expose_secret().as_bytes()).into())
    }

    /// Timing-safe check of a candidate token
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        constant_time_eq(&self.0, &candidate)
    }
}

/// Extract the bearer token from the Authorization header
fn extract_bearer(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware to verify the webhook secret
pub async fn require_webhook_secret(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Response {
    // If no secret configured, allow all requests (development mode)
    let Some(expected) = &state.webhook_secret else {
        return next.run(req).await;
    };

    match extract_bearer(&req) {
        Some(token) if expected.matches(token) => next.run(req).await,
        Some(_) => {
            tracing::warn!("webhook request with invalid auth");
            error_response(StatusCode::UNAUTHORIZED, "Unauthorized")
        }
        None => {
            tracing::warn!("webhook request without auth");
            error_response(StatusCode::UNAUTHORIZED, "Unauthorized")
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_extract_bearer() {
        let mut req = Request::builder().body(Body::empty()).unwrap();

        // No header
        assert_eq!(extract_bearer(&req), None);

        req.headers_mut()
            .insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&req), None);

        req.headers_mut().insert(
            "authorization",
            HeaderValue::from_static("Bearer test-secret"),
        );
        assert_eq!(extract_bearer(&req), Some("test-secret"));
    }

    #[test]
    fn test_secret_digest_matches() {
        let digest = SecretDigest::new(&SecretString::from("test-secret".to_string()));
        assert!(digest.matches("test-secret"));
        assert!(!digest.matches("test-secre"));
        assert!(!digest.matches("test-secret "));
        assert!(!digest.matches(""));
    }
}
