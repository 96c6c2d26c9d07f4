//! Shared application state for the Axum API server.

use std::sync::Arc;

use ossa_common::config::AppConfig;
use ossa_engine::Notifier;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub notifier: Arc<Notifier>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(notifier: Notifier, config: AppConfig) -> Self {
        Self {
            notifier: Arc::new(notifier),
            config,
        }
    }
}
