//! Ossa API server binary entrypoint.

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ossa_common::config::AppConfig;
use ossa_engine::{Notifier, NotifierOptions};

use ossa_api::listener::log_deliveries;
use ossa_api::routes::create_router;
use ossa_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter("ossa_api"))),
        )
        .init();

    tracing::info!("Starting Ossa API server...");

    // Connect the engine (also starts the expiry bridge)
    let notifier = Notifier::connect(NotifierOptions::from(&config)).await?;
    tracing::info!(namespace = %notifier.namespace(), "Notifier ready");

    tokio::spawn(log_deliveries(notifier.subscribe()));

    // Build application state
    let port = config.api_port;
    let state = AppState::new(notifier, config);

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal, stopping gracefully...");
        })
        .await?;

    tracing::info!("Ossa API server stopped.");
    Ok(())
}
