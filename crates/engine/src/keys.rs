//! Key naming for a namespace.
//!
//! Every record the engine touches lives under `<namespace>::`:
//! - timer records: `<namespace>::<uuid>` (also the notification ID)
//! - payload store: `<namespace>::ossa_payload_store` (hash, ID → JSON)
//! - processing queue: `<namespace>::ossa_processing_queue` (list of IDs)

use uuid::Uuid;

use ossa_common::error::AppError;

const SEPARATOR: &str = "::";

/// Names derived from one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    namespace: String,
    prefix: String,
    payload_store: String,
    processing_queue: String,
}

impl Keyspace {
    pub fn new(namespace: &str) -> Result<Self, AppError> {
        if namespace.is_empty() {
            return Err(AppError::Validation("namespace must not be empty".into()));
        }
        if namespace.contains(SEPARATOR) {
            return Err(AppError::Validation(format!(
                "namespace '{}' must not contain '{}'",
                namespace, SEPARATOR
            )));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            prefix: format!("{namespace}{SEPARATOR}"),
            payload_store: format!("{namespace}{SEPARATOR}ossa_payload_store"),
            processing_queue: format!("{namespace}{SEPARATOR}ossa_processing_queue"),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn payload_store(&self) -> &str {
        &self.payload_store
    }

    pub fn processing_queue(&self) -> &str {
        &self.processing_queue
    }

    /// Generate a fresh notification ID in this namespace.
    pub fn new_notification_id(&self) -> String {
        format!("{}{}", self.prefix, Uuid::new_v4())
    }

    /// Whether a key carries this namespace's prefix (case-insensitive).
    ///
    /// Expiry broadcasts are store-wide, so this is the filter that keeps one
    /// namespace from enqueueing another's timers.
    pub fn owns(&self, key: &str) -> bool {
        key.len() > self.prefix.len()
            && key.is_char_boundary(self.prefix.len())
            && key[..self.prefix.len()].eq_ignore_ascii_case(&self.prefix)
            && !self.is_internal(key)
    }

    /// Reject IDs that do not belong to this namespace.
    pub fn validate_id(&self, notification_id: &str) -> Result<(), AppError> {
        if self.owns(notification_id) {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "notificationID '{}' is missing or the format is invalid (expected '{}<id>')",
                notification_id, self.prefix
            )))
        }
    }

    /// Key-event channel carrying every expired key name in `db`.
    pub fn expired_channel(db: i64) -> String {
        format!("__keyevent@{db}__:expired")
    }

    /// Key-space channel carrying the operations applied to the processing queue.
    pub fn queue_channel(&self, db: i64) -> String {
        format!("__keyspace@{db}__:{}", self.processing_queue)
    }

    fn is_internal(&self, key: &str) -> bool {
        key.eq_ignore_ascii_case(&self.payload_store)
            || key.eq_ignore_ascii_case(&self.processing_queue)
    }
}
