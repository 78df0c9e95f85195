//! API endpoint integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use tower::ServiceExt;

mod common;
use common::{BotBehavior, SECRET, test_app, test_app_with};

fn event(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook/ha-event")
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {SECRET}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _channel) = test_app(BotBehavior::Silent);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["referrer-policy"], "no-referrer");

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["whatsapp"], true);
    assert!(json["version"].is_string());
    assert!(json["uptime"].is_number());
}

#[tokio::test]
async fn test_ready_reflects_transport() {
    let (app, channel) = test_app(BotBehavior::Silent);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    channel.set_ready(false);
    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = json_body(response).await;
    assert_eq!(json["checks"]["whatsapp"]["status"], "fail");
}

#[tokio::test]
async fn test_event_requires_auth() {
    let (app, channel) = test_app(BotBehavior::Silent);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/ha-event")
                .body(Body::from(r#"{"action":"list"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Unauthorized");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/ha-event")
                .header("Authorization", "Bearer wrong")
                .body(Body::from(r#"{"action":"list"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn test_event_validation_errors() {
    let cases = [
        ("{not json", "Invalid JSON"),
        (r#"{"action":"explode"}"#, "Invalid or missing action"),
        (r#"{"item":"מלח"}"#, "Invalid or missing action"),
        (r#"{"action":"add"}"#, "Missing item for action: add"),
        (r#"{"action":"remove","item":7}"#, "Item must be a string"),
        (r#"{"action":"add","item":"   "}"#, "Invalid item (empty or too long)"),
    ];

    for (body, expected) in cases {
        let (app, channel) = test_app(BotBehavior::Silent);
        let response = app.oneshot(event(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(json_body(response).await["error"], expected, "body: {body}");
        assert!(channel.sent().is_empty());
    }
}

#[tokio::test]
async fn test_event_body_limit() {
    let (app, _channel) = test_app(BotBehavior::Silent);
    let body = format!(r#"{{"action":"add","item":"{}"}}"#, "x".repeat(11 * 1024));

    let response = app.oneshot(event(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_event_when_not_connected() {
    let (app, channel) = test_app(BotBehavior::Silent);
    channel.set_ready(false);

    let response = app
        .oneshot(event(r#"{"action":"add","item":"מלח"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"], "WhatsApp not connected");
}

#[tokio::test(start_paused = true)]
async fn test_event_text_reply() {
    let (app, channel) = test_app(BotBehavior::Text("נוסף".to_string()));

    let response = app
        .oneshot(event(r#"{"action":"add","item":" מלח "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["message"], "נוסף");
    assert_eq!(json["voice_message"], "נוסף");
    assert_eq!(channel.sent(), vec!["הוסף מלח".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_event_reaction_becomes_confirmation() {
    let (app, channel) = test_app(BotBehavior::Reaction("👍".to_string()));

    let response = app
        .oneshot(event(r#"{"action":"bought","item":"חלב"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["message"], "הפריט חלב סומן כנקנה");
    assert_eq!(channel.sent(), vec!["קניתי חלב".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_list_reaction_keeps_reaction_text() {
    let (app, _channel) = test_app(BotBehavior::Reaction("🎉".to_string()));

    let response = app.oneshot(event(r#"{"action":"list"}"#)).await.unwrap();

    let json = json_body(response).await;
    assert_eq!(json["message"], "הבוט הגיב: 🎉 🎉");
}

#[tokio::test(start_paused = true)]
async fn test_list_voice_message_strips_markup() {
    let (app, channel) = test_app(BotBehavior::Text("*רשימה:*\n_חלב_\n~לחם~".to_string()));

    let response = app.oneshot(event(r#"{"action":"list"}"#)).await.unwrap();

    let json = json_body(response).await;
    assert_eq!(json["message"], "*רשימה:*\n_חלב_\n~לחם~");
    assert_eq!(json["voice_message"], "רשימה:. חלב. לחם");
    assert_eq!(channel.sent(), vec!["רשימה".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_event_timeout_sentinel() {
    let (app, _channel) = test_app(BotBehavior::Silent);

    let response = app.oneshot(event(r#"{"action":"clear"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["message"], "הבוט לא הגיב. נסה שוב מאוחר יותר.");
}

#[tokio::test]
async fn test_event_without_secret_is_open() {
    let (app, _channel) = test_app_with(BotBehavior::Silent, None, 30);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/ha-event")
                .body(Body::from(r#"{"action":"add"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    // Reaches validation instead of being rejected
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_event_rate_limited() {
    let (app, _channel) = test_app_with(BotBehavior::Silent, Some(SECRET), 2);

    for _ in 0..2 {
        let response = app.clone().oneshot(event("{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app.oneshot(event("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_health_not_rate_limited() {
    let (app, _channel) = test_app_with(BotBehavior::Silent, Some(SECRET), 1);

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_whatsapp_webhook_absent_without_channel() {
    let (app, _channel) = test_app(BotBehavior::Silent);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/whatsapp")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
