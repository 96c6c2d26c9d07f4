//! Health check endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = if state.notifier.is_running() {
        "ok"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "service": "ossa-api",
        "version": env!("CARGO_PKG_VERSION"),
        "namespace": state.notifier.namespace(),
    }))
}
