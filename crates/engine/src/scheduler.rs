//! Scheduler — create/read/update/delete for pending notifications.
//!
//! A pending notification is two records written together:
//! - a timer record `<namespace>::<uuid>` whose TTL is the delay
//! - a payload entry in the namespace's payload hash under the same ID
//!
//! Writes go out as `MULTI`/`EXEC` batches. Redis does not roll back a batch
//! when one of its commands fails, so a batch is a paired write sent without
//! interleaving, not an all-or-nothing transaction.

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use ossa_common::error::AppError;
use ossa_common::types::{NotificationPayload, NotificationState, TimeToLive};

use crate::keys::Keyspace;
use crate::schedule::{self, Expiry};

/// Expiry used when a notification is due immediately. `SETEX` rejects 0.
const IMMEDIATE_EXPIRY_MS: u64 = 1;

/// CRUD surface over one namespace.
#[derive(Clone)]
pub struct Scheduler {
    redis: ConnectionManager,
    keys: Keyspace,
}

impl Scheduler {
    pub fn new(redis: ConnectionManager, keys: Keyspace) -> Self {
        Self { redis, keys }
    }

    pub fn keys(&self) -> &Keyspace {
        &self.keys
    }

    /// Schedule a notification. Returns its ID (`<namespace>::<uuid>`).
    pub async fn schedule(&self, payload: &NotificationPayload) -> Result<String, AppError> {
        let now = Utc::now();
        let expiry = schedule::resolve(payload, now)?;
        let ttl_seconds = expiry.ttl_seconds(now);

        let notification_id = self.keys.new_notification_id();
        let body = serde_json::to_string(payload)?;

        tracing::debug!(
            notification_id = %notification_id,
            ttl_seconds,
            "Scheduling notification"
        );

        let mut pipe = redis::pipe();
        pipe.atomic();
        if ttl_seconds > 0 {
            pipe.cmd("SETEX")
                .arg(&notification_id)
                .arg(ttl_seconds)
                .arg(timer_value(now));
        } else {
            pipe.cmd("SET")
                .arg(&notification_id)
                .arg(timer_value(now))
                .arg("PX")
                .arg(IMMEDIATE_EXPIRY_MS);
        }
        pipe.cmd("HSET")
            .arg(self.keys.payload_store())
            .arg(&notification_id)
            .arg(&body);

        let mut redis = self.redis.clone();
        let (ack, _fields): (String, i64) = pipe.query_async(&mut redis).await?;
        if ack != "OK" {
            return Err(AppError::StoreProtocol(format!(
                "timer write for {} not acknowledged: {}",
                notification_id, ack
            )));
        }

        tracing::info!(
            notification_id = %notification_id,
            namespace = %self.keys.namespace(),
            ttl_seconds,
            "Notification scheduled"
        );

        Ok(notification_id)
    }

    /// Read the remaining time and payload of a notification in one batch.
    pub async fn get(&self, notification_id: &str) -> Result<NotificationState, AppError> {
        self.keys.validate_id(notification_id)?;

        let mut redis = self.redis.clone();
        let (pttl, raw): (i64, Option<String>) = redis::pipe()
            .atomic()
            .cmd("PTTL")
            .arg(notification_id)
            .cmd("HGET")
            .arg(self.keys.payload_store())
            .arg(notification_id)
            .query_async(&mut redis)
            .await?;

        let payload = raw
            .map(|raw| decode_stored_payload(notification_id, &raw))
            .transpose()?;

        tracing::debug!(notification_id = %notification_id, pttl, "Notification read");

        Ok(NotificationState {
            ttl: TimeToLive::from_pttl(pttl),
            payload,
        })
    }

    /// Reschedule and replace a pending notification.
    ///
    /// Returns `false` without writing anything when the timer record no
    /// longer exists. The timer rewrite is confirmed before the payload is
    /// overwritten. A timer that fires between the two steps delivers the
    /// old payload if the claim lands first, leaving the new one orphaned in
    /// the payload store.
    pub async fn update(
        &self,
        notification_id: &str,
        payload: &NotificationPayload,
    ) -> Result<bool, AppError> {
        self.keys.validate_id(notification_id)?;
        let now = Utc::now();
        let expiry = schedule::resolve(payload, now)?;

        tracing::debug!(notification_id = %notification_id, ?expiry, "Updating notification");

        let mut redis = self.redis.clone();
        let rescheduled = match expiry {
            Expiry::At(at) => {
                // SET XX drops the old TTL; PEXPIREAT installs the new one.
                let (ack, _): (Option<String>, i64) = redis::pipe()
                    .atomic()
                    .cmd("SET")
                    .arg(notification_id)
                    .arg(timer_value(now))
                    .arg("XX")
                    .cmd("PEXPIREAT")
                    .arg(notification_id)
                    .arg(at.timestamp_millis())
                    .query_async(&mut redis)
                    .await?;
                ack.is_some()
            }
            Expiry::After(_) | Expiry::Immediate => {
                let ack: Option<String> = redis::cmd("SET")
                    .arg(notification_id)
                    .arg(timer_value(now))
                    .arg("PX")
                    .arg(expiry_millis(&expiry))
                    .arg("XX")
                    .query_async(&mut redis)
                    .await?;
                ack.is_some()
            }
        };

        if !rescheduled {
            tracing::debug!(
                notification_id = %notification_id,
                "Update skipped: notification not found or already expired"
            );
            return Ok(false);
        }

        let body = serde_json::to_string(payload)?;
        let _: i64 = redis
            .hset(self.keys.payload_store(), notification_id, body)
            .await?;

        tracing::info!(notification_id = %notification_id, "Notification updated");
        Ok(true)
    }

    /// Cancel a notification. Returns `true` if its timer still existed.
    pub async fn delete(&self, notification_id: &str) -> Result<bool, AppError> {
        self.keys.validate_id(notification_id)?;

        let mut redis = self.redis.clone();
        let (timers, _payloads): (i64, i64) = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(notification_id)
            .cmd("HDEL")
            .arg(self.keys.payload_store())
            .arg(notification_id)
            .query_async(&mut redis)
            .await?;

        let deleted = timers > 0;
        if deleted {
            tracing::info!(notification_id = %notification_id, "Notification deleted");
        } else {
            tracing::debug!(
                notification_id = %notification_id,
                "Delete found no pending timer"
            );
        }

        Ok(deleted)
    }
}

/// Value stored in a timer record. Only its existence and TTL matter.
fn timer_value(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Decode a payload read back from the payload store. A record that does
/// not decode is a store fault, not a caller error.
pub(crate) fn decode_stored_payload(
    notification_id: &str,
    raw: &str,
) -> Result<NotificationPayload, AppError> {
    serde_json::from_str(raw).map_err(|e| {
        AppError::StoreProtocol(format!("corrupt payload for {}: {}", notification_id, e))
    })
}

/// Relative expiry in milliseconds for `SET … PX`, never below 1.
fn expiry_millis(expiry: &Expiry) -> u64 {
    match expiry {
        Expiry::After(delay) => (delay.as_millis() as u64).max(IMMEDIATE_EXPIRY_MS),
        Expiry::Immediate | Expiry::At(_) => IMMEDIATE_EXPIRY_MS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_expiry_millis_never_zero() {
        assert_eq!(expiry_millis(&Expiry::Immediate), 1);
        assert_eq!(expiry_millis(&Expiry::After(Duration::ZERO)), 1);
        assert_eq!(expiry_millis(&Expiry::After(Duration::from_secs(2))), 2_000);
    }

    #[test]
    fn test_expiry_millis_fits_redis_bound() {
        let longest = Expiry::After(Duration::from_millis(schedule::MAX_DELAY_MS));
        assert!(i64::try_from(expiry_millis(&longest)).is_ok());
    }

    #[test]
    fn test_decode_stored_payload() {
        let payload = decode_stored_payload("ossa::1", r#"{"message":"hi","in":"5s"}"#).unwrap();
        assert_eq!(payload.message, "hi");

        let err = decode_stored_payload("ossa::1", "{not json").unwrap_err();
        assert!(matches!(err, AppError::StoreProtocol(ref msg) if msg.contains("ossa::1")));
    }

    #[test]
    fn test_timer_value_format() {
        let now = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timer_value(now), "2026-03-01 12:00:00");
    }
}
