//! Integration tests for API routes.
//!
//! Uses `tower::ServiceExt` to test Axum routes without a real HTTP server.
//! Requires a running Redis.
//!
//! ```bash
//! REDIS_URL="redis://localhost:6379" \
//!   cargo test -p ossa-api --test integration -- --ignored --nocapture
//! ```

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use uuid::Uuid;

use ossa_api::routes::create_router;
use ossa_api::state::AppState;
use ossa_common::config::AppConfig;
use ossa_engine::{Notifier, NotifierOptions};

// ============================================================
// Helpers
// ============================================================

/// Create a test AppConfig with a namespace no other test uses.
fn test_config() -> AppConfig {
    AppConfig {
        redis_url: std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        namespace: format!("api_test_{}", Uuid::new_v4().simple()),
        debug: false,
        api_port: 0,
    }
}

async fn build_test_app() -> (Router, AppConfig) {
    let config = test_config();
    let notifier = Notifier::connect(NotifierOptions::from(&config))
        .await
        .unwrap();
    (create_router(AppState::new(notifier, config.clone())), config)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ============================================================
// Route tests
// ============================================================

#[tokio::test]
#[ignore]
async fn test_health_endpoint() {
    let (app, config) = build_test_app().await;

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "ossa-api");
    assert_eq!(json["namespace"], config.namespace);
}

#[tokio::test]
#[ignore]
async fn test_notification_crud_via_api() {
    let (app, config) = build_test_app().await;

    // 1. Schedule
    let (status, created) = send(
        &app,
        "POST",
        "/api/notifications",
        Some(serde_json::json!({"message": "hello", "in": "10m", "channel": "sms"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["message"], "hello");
    assert_eq!(created["channel"], "sms");
    let id = created["notification_id"].as_str().unwrap().to_string();
    assert!(id.starts_with(&format!("{}::", config.namespace)));

    // 2. Read
    let uri = format!("/api/notifications/{}", id);
    let (status, fetched) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let ttl = fetched["ttl"].as_i64().unwrap();
    assert!(ttl > 0 && ttl <= 600_000);
    assert_eq!(fetched["payload"]["message"], "hello");

    // 3. Update
    let (status, updated) = send(
        &app,
        "PUT",
        &uri,
        Some(serde_json::json!({"message": "changed", "in": "1h"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["updated"], 1);

    let (_, fetched) = send(&app, "GET", &uri, None).await;
    assert_eq!(fetched["payload"]["message"], "changed");

    // 4. Delete, twice
    let (status, deleted) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], 1);

    let (_, deleted) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(deleted["deleted"], 0);

    let (_, fetched) = send(&app, "GET", &uri, None).await;
    assert_eq!(fetched["ttl"], -2);
    assert!(fetched["payload"].is_null());

    // 5. Update after delete is a no-op
    let (_, updated) = send(
        &app,
        "PUT",
        &uri,
        Some(serde_json::json!({"message": "ghost", "in": "1m"})),
    )
    .await;
    assert_eq!(updated["updated"], 0);
}

#[tokio::test]
#[ignore]
async fn test_validation_errors_are_bad_requests() {
    let (app, _) = build_test_app().await;

    for body in [
        serde_json::json!({"message": ""}),
        serde_json::json!({"in": "1s"}),
        serde_json::json!({"message": "x", "on": "not-a-date"}),
        serde_json::json!({"message": "x", "on": "2000-01-01"}),
    ] {
        let (status, json) = send(&app, "POST", "/api/notifications", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    let (status, _) = send(&app, "GET", "/api/notifications/elsewhere::123", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
