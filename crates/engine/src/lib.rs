//! Delayed notifications on top of Redis key expiry and pub/sub.
//!
//! - [`scheduler`]: create/read/update/delete of pending notifications
//! - [`bridge`]: expiry broadcast → processing queue → exactly-once claim
//! - [`notifier`]: the handle tying both together for one namespace

pub mod bridge;
pub mod keys;
pub mod notifier;
pub mod schedule;
pub mod scheduler;

pub use notifier::{Notifier, NotifierOptions};
