use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Common error types used across the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The store answered, but not with the acknowledgement we required, or
    /// a record it holds cannot be decoded.
    #[error("Store protocol error: {0}")]
    StoreProtocol(String),

    /// A dequeued notification whose payload was already consumed or deleted.
    #[error("Delivery miss: {0}")]
    DeliveryMiss(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Redis(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::StoreProtocol(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DeliveryMiss(_) => StatusCode::CONFLICT,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Validation(msg) => msg.clone(),
            _ => self.to_string(),
        };

        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
