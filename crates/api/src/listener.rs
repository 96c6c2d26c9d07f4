//! Local `notification-received` listener shared by the binaries.

use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

use ossa_common::types::DeliveredNotification;

/// Log every notification delivered to this process until the engine stops.
pub async fn log_deliveries(mut deliveries: Receiver<DeliveredNotification>) {
    loop {
        match deliveries.recv().await {
            Ok(delivered) => {
                tracing::info!(
                    notification_id = %delivered.id,
                    message = %delivered.payload.message,
                    payload = %serde_json::to_string(&delivered.payload).unwrap_or_default(),
                    "Notification received"
                );
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Listener lagged; deliveries dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
