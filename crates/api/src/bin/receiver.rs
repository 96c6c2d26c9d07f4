//! Receiver-only process: claims and logs notifications for a namespace.
//!
//! Run several of these against one Redis to watch each notification land on
//! exactly one of them.

use ossa_common::config::AppConfig;
use ossa_engine::{Notifier, NotifierOptions};

use ossa_api::listener::log_deliveries;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter("ossa_receiver").into()),
        )
        .json()
        .init();

    tracing::info!("Ossa receiver starting...");

    let notifier = Notifier::connect(NotifierOptions::from(&config)).await?;
    tracing::info!(namespace = %notifier.namespace(), "Listening for notifications");

    tokio::select! {
        _ = log_deliveries(notifier.subscribe()) => {
            tracing::error!("Delivery stream closed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Ossa receiver stopped.");
    Ok(())
}
