//! Notification scheduling routes.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use ossa_common::error::AppError;
use ossa_common::types::NotificationPayload;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", post(schedule_notification))
        .route(
            "/api/notifications/{id}",
            get(get_notification)
                .put(update_notification)
                .delete(delete_notification),
        )
}

/// POST /api/notifications — Schedule a notification.
///
/// Echoes the payload back with the generated `notification_id`.
async fn schedule_notification(
    State(state): State<AppState>,
    Json(payload): Json<NotificationPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    let notification_id = state.notifier.schedule(&payload).await?;

    let mut body = serde_json::to_value(&payload)?;
    if let Some(fields) = body.as_object_mut() {
        fields.insert("notification_id".to_string(), json!(notification_id));
    }
    Ok(Json(body))
}

/// GET /api/notifications/:id — Remaining time-to-live (ms, -1, -2) and payload.
async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let notification = state.notifier.get(&id).await?;
    Ok(Json(json!({
        "notification_id": id,
        "ttl": notification.ttl,
        "payload": notification.payload,
    })))
}

/// PUT /api/notifications/:id — Reschedule and replace a pending notification.
async fn update_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<NotificationPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = state.notifier.update(&id, &payload).await?;
    Ok(Json(json!({
        "notification_id": id,
        "updated": u8::from(updated),
    })))
}

/// DELETE /api/notifications/:id — Cancel a pending notification.
async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = state.notifier.delete(&id).await?;
    Ok(Json(json!({
        "notification_id": id,
        "deleted": u8::from(deleted),
    })))
}
