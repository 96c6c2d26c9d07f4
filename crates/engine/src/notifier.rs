//! `Notifier` — the handle producers and listeners hold.
//!
//! Each call to [`Notifier::connect`] builds an independent engine: a command
//! connection, a running expiry bridge and a local event channel. Share one
//! engine by sharing the handle (e.g. behind an `Arc`).

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use ossa_common::config::{AppConfig, DEFAULT_NAMESPACE};
use ossa_common::error::AppError;
use ossa_common::redis_pool::{create_redis_pool, open_client};
use ossa_common::types::{DeliveredNotification, NotificationPayload, NotificationState};

use crate::bridge::ExpiryBridge;
use crate::keys::Keyspace;
use crate::scheduler::Scheduler;

/// Deliveries buffered per listener before a slow listener starts lagging.
const EVENT_CAPACITY: usize = 1024;

/// Connection and namespace settings for a [`Notifier`].
#[derive(Debug, Clone)]
pub struct NotifierOptions {
    pub namespace: String,
    pub redis_url: String,
}

impl NotifierOptions {
    pub fn new(redis_url: impl Into<String>) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            redis_url: redis_url.into(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

impl From<&AppConfig> for NotifierOptions {
    fn from(config: &AppConfig) -> Self {
        Self::new(config.redis_url.clone()).namespace(config.namespace.clone())
    }
}

/// Scheduling API plus a stream of notifications delivered to this process.
pub struct Notifier {
    scheduler: Scheduler,
    events: broadcast::Sender<DeliveredNotification>,
    bridge: JoinHandle<()>,
}

impl Notifier {
    /// Connect to Redis, enable keyspace notifications and start the bridge.
    pub async fn connect(options: NotifierOptions) -> Result<Self, AppError> {
        let keys = Keyspace::new(&options.namespace)?;
        let client = open_client(&options.redis_url)?;
        let redis = create_redis_pool(&client).await?;

        tracing::info!(
            namespace = %keys.namespace(),
            payload_store = %keys.payload_store(),
            processing_queue = %keys.processing_queue(),
            "Starting notifier"
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let bridge =
            ExpiryBridge::start(&client, redis.clone(), keys.clone(), events.clone()).await?;

        Ok(Self {
            scheduler: Scheduler::new(redis, keys),
            events,
            bridge,
        })
    }

    pub fn namespace(&self) -> &str {
        self.scheduler.keys().namespace()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Listen for `notification-received` events claimed by this engine.
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveredNotification> {
        self.events.subscribe()
    }

    /// Whether the expiry bridge is still consuming broadcasts.
    pub fn is_running(&self) -> bool {
        !self.bridge.is_finished()
    }

    pub async fn schedule(&self, payload: &NotificationPayload) -> Result<String, AppError> {
        self.scheduler.schedule(payload).await
    }

    pub async fn get(&self, notification_id: &str) -> Result<NotificationState, AppError> {
        self.scheduler.get(notification_id).await
    }

    pub async fn update(
        &self,
        notification_id: &str,
        payload: &NotificationPayload,
    ) -> Result<bool, AppError> {
        self.scheduler.update(notification_id, payload).await
    }

    pub async fn delete(&self, notification_id: &str) -> Result<bool, AppError> {
        self.scheduler.delete(notification_id).await
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.bridge.abort();
    }
}
