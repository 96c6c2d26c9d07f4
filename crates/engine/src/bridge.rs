//! Expiry bridge — turns Redis' store-wide expiry broadcast into a single
//! local delivery.
//!
//! Every bridge in a namespace sees every broadcast, so delivery is a
//! two-phase hand-off:
//! 1. `__keyevent@<db>__:expired` for one of our timers → `LPUSH` the ID
//!    onto the processing queue.
//! 2. `__keyspace@<db>__:<queue>` reporting `lpush` → `BLPOP` the queue, then
//!    `HGET`+`HDEL` the payload in one batch. Redis hands each queued ID to
//!    exactly one popper, and only the batch that actually removed the
//!    payload emits it.
//!
//! Each bridge pushes on every expiry it observes, so with N bridges running
//! an ID is queued N times. The extra copies are popped later and end as
//! delivery misses once the payload is gone.
//!
//! A bridge keeps at most one claim outstanding. A claim blocks for the
//! first ID and then pops without blocking until the queue is empty, so a
//! burst of pushes costs one waiter per bridge rather than one per push.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{AsyncCommands, Client, Msg};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};

use ossa_common::error::AppError;
use ossa_common::redis_pool::db_index;
use ossa_common::types::DeliveredNotification;

use crate::keys::Keyspace;
use crate::scheduler::decode_stored_payload;

/// `notify-keyspace-events` flags: key-event (E) expired (x) and key-space
/// (K) list (l) notifications.
const KEYSPACE_EVENTS: &str = "ExKl";

/// Key-space operation reported when something is pushed onto the queue.
const QUEUE_PUSH_EVENT: &str = "lpush";

/// What a pub/sub message asks the bridge to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeAction {
    /// One of our timers expired; queue it for claiming.
    Enqueue(String),
    /// Something landed on our queue; race to pop it.
    Claim,
}

/// Channel names for one namespace and the routing between them.
#[derive(Debug, Clone)]
pub struct BridgeRoutes {
    keys: Keyspace,
    expired_channel: String,
    queue_channel: String,
}

impl BridgeRoutes {
    pub fn new(keys: Keyspace, db: i64) -> Self {
        Self {
            expired_channel: Keyspace::expired_channel(db),
            queue_channel: keys.queue_channel(db),
            keys,
        }
    }

    pub fn channels(&self) -> [&str; 2] {
        [self.expired_channel.as_str(), self.queue_channel.as_str()]
    }

    /// Map a pub/sub message to an action, ignoring anything not ours.
    pub fn route(&self, channel: &str, payload: &str) -> Option<BridgeAction> {
        if channel == self.expired_channel && self.keys.owns(payload) {
            Some(BridgeAction::Enqueue(payload.to_string()))
        } else if channel == self.queue_channel && payload == QUEUE_PUSH_EVENT {
            Some(BridgeAction::Claim)
        } else {
            None
        }
    }
}

/// Running bridge state shared with claim tasks.
pub struct ExpiryBridge {
    routes: BridgeRoutes,
    /// Request/response commands (LPUSH, HGET/HDEL).
    redis: ConnectionManager,
    /// Dedicated to BLPOP so a blocked pop never stalls other commands.
    blocking: MultiplexedConnection,
    events: broadcast::Sender<DeliveredNotification>,
}

impl ExpiryBridge {
    /// Enable the expiry and list notifications the bridge depends on.
    pub async fn enable_keyspace_events(redis: &mut ConnectionManager) -> Result<(), AppError> {
        let reply: String = redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg(KEYSPACE_EVENTS)
            .query_async(redis)
            .await
            .map_err(|e| {
                AppError::Config(format!("Error enabling Redis keyspace notifications: {}", e))
            })?;

        if reply != "OK" {
            return Err(AppError::StoreProtocol(format!(
                "CONFIG SET notify-keyspace-events answered {}",
                reply
            )));
        }

        tracing::debug!(flags = KEYSPACE_EVENTS, "Keyspace notifications enabled");
        Ok(())
    }

    /// Configure Redis, subscribe, and spawn the bridge loop.
    ///
    /// Fails if keyspace notifications cannot be enabled or the subscription
    /// cannot be established.
    pub async fn start(
        client: &Client,
        mut redis: ConnectionManager,
        keys: Keyspace,
        events: broadcast::Sender<DeliveredNotification>,
    ) -> Result<JoinHandle<()>, AppError> {
        Self::enable_keyspace_events(&mut redis).await?;

        let routes = BridgeRoutes::new(keys, db_index(client));
        let blocking = client.get_multiplexed_async_connection().await?;

        let mut pubsub = client.get_async_pubsub().await?;
        for channel in routes.channels() {
            pubsub.subscribe(channel).await?;
            tracing::info!(channel, "Subscriber subscribed");
        }

        let bridge = Arc::new(Self {
            routes,
            redis,
            blocking,
            events,
        });

        Ok(tokio::spawn(bridge.run(pubsub.into_on_message())))
    }

    async fn run<S>(self: Arc<Self>, messages: S)
    where
        S: Stream<Item = Msg> + Send + 'static,
    {
        let mut messages = std::pin::pin!(messages);
        let mut claims: JoinSet<Result<usize, AppError>> = JoinSet::new();
        let mut gate = ClaimGate::default();

        loop {
            tokio::select! {
                message = messages.next() => {
                    let Some(message) = message else {
                        tracing::error!(
                            namespace = %self.routes.keys.namespace(),
                            "Subscription stream closed, expiry bridge stopped"
                        );
                        break;
                    };
                    if self.dispatch(&message).await && gate.on_push() {
                        self.spawn_claim(&mut claims);
                    }
                }
                Some(joined) = claims.join_next(), if !claims.is_empty() => {
                    Self::report(joined);
                    if gate.on_finished() {
                        self.spawn_claim(&mut claims);
                    }
                }
            }
        }
    }

    /// Handle one pub/sub message. Returns `true` when the queue grew and a
    /// claim is wanted.
    async fn dispatch(&self, message: &Msg) -> bool {
        let channel = message.get_channel_name();
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(channel, error = %e, "Unreadable pub/sub payload");
                return false;
            }
        };

        match self.routes.route(channel, &payload) {
            Some(BridgeAction::Enqueue(notification_id)) => {
                tracing::debug!(notification_id = %notification_id, "[EXPIRED] timer fired");
                if let Err(e) = self.enqueue(&notification_id).await {
                    tracing::error!(
                        notification_id = %notification_id,
                        error = %e,
                        "Failed to enqueue expired notification"
                    );
                }
                false
            }
            Some(BridgeAction::Claim) => {
                tracing::debug!(channel, "[LPUSH] processing queue grew");
                true
            }
            None => false,
        }
    }

    fn spawn_claim(self: &Arc<Self>, claims: &mut JoinSet<Result<usize, AppError>>) {
        let bridge = Arc::clone(self);
        claims.spawn(async move { bridge.drain_queue().await });
    }

    async fn enqueue(&self, notification_id: &str) -> Result<(), AppError> {
        let mut redis = self.redis.clone();
        let queued: i64 = redis
            .lpush(self.routes.keys.processing_queue(), notification_id)
            .await?;

        tracing::debug!(notification_id = %notification_id, queued, "Enqueued for claiming");
        Ok(())
    }

    /// Wait for one queued ID, then keep popping without blocking until the
    /// queue is empty. Returns how many IDs this bridge popped.
    async fn drain_queue(&self) -> Result<usize, AppError> {
        let queue = self.routes.keys.processing_queue();
        let mut blocking = self.blocking.clone();

        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(queue)
            .arg(0)
            .query_async(&mut blocking)
            .await?;
        let Some((_queue, mut notification_id)) = popped else {
            return Err(AppError::StoreProtocol(
                "BLPOP without timeout returned nothing".into(),
            ));
        };

        let mut popped_count = 0;
        loop {
            popped_count += 1;
            self.deliver(&notification_id).await;

            let next: Option<String> = blocking.lpop(queue, None).await?;
            match next {
                Some(id) => notification_id = id,
                None => return Ok(popped_count),
            }
        }
    }

    /// Claim a popped ID and emit it. Failures are logged; the queue keeps
    /// draining.
    async fn deliver(&self, notification_id: &str) {
        let mut redis = self.redis.clone();
        match claim_notification(&mut redis, &self.routes.keys, notification_id).await {
            Ok(delivered) => {
                if self.events.send(delivered).is_err() {
                    tracing::warn!(
                        notification_id = %notification_id,
                        "Notification claimed but no local listener is subscribed"
                    );
                } else {
                    tracing::info!(
                        notification_id = %notification_id,
                        "notification-received emitted"
                    );
                }
            }
            Err(AppError::DeliveryMiss(detail)) => {
                tracing::warn!(detail = %detail, "Delivery miss: payload already consumed or deleted");
            }
            Err(e) => {
                tracing::error!(
                    notification_id = %notification_id,
                    error = %e,
                    "Failed to claim queued notification"
                );
            }
        }
    }

    fn report(joined: Result<Result<usize, AppError>, tokio::task::JoinError>) {
        match joined {
            Ok(Ok(popped)) => {
                tracing::debug!(popped, "Processing queue drained");
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to pop processing queue");
            }
            Err(e) => {
                tracing::error!(error = %e, "Claim task failed");
            }
        }
    }
}

/// Keeps a bridge to one outstanding claim.
///
/// A push seen while a claim is running only marks the gate for re-arm.
/// The running claim drains whatever is queued, and the re-arm starts one
/// more claim afterwards for anything pushed after its last pop.
#[derive(Debug, Default)]
struct ClaimGate {
    in_flight: bool,
    rearm: bool,
}

impl ClaimGate {
    /// A queue push was observed. Returns `true` if a claim should start.
    fn on_push(&mut self) -> bool {
        if self.in_flight {
            self.rearm = true;
            false
        } else {
            self.in_flight = true;
            true
        }
    }

    /// The running claim finished. Returns `true` if another should start.
    fn on_finished(&mut self) -> bool {
        if std::mem::take(&mut self.rearm) {
            true
        } else {
            self.in_flight = false;
            false
        }
    }
}

/// Atomically read and remove a notification's payload.
///
/// Only the caller whose `HDEL` removed the entry gets the payload; everyone
/// else gets [`AppError::DeliveryMiss`].
pub async fn claim_notification(
    redis: &mut ConnectionManager,
    keys: &Keyspace,
    notification_id: &str,
) -> Result<DeliveredNotification, AppError> {
    let (raw, removed): (Option<String>, i64) = redis::pipe()
        .atomic()
        .cmd("HGET")
        .arg(keys.payload_store())
        .arg(notification_id)
        .cmd("HDEL")
        .arg(keys.payload_store())
        .arg(notification_id)
        .query_async(redis)
        .await?;

    let raw = match raw {
        Some(raw) if removed > 0 => raw,
        _ => {
            return Err(AppError::DeliveryMiss(format!(
                "no payload for {} (removed: {})",
                notification_id, removed
            )));
        }
    };

    let payload = decode_stored_payload(notification_id, &raw)?;
    Ok(DeliveredNotification {
        id: notification_id.to_string(),
        payload,
    })
}
