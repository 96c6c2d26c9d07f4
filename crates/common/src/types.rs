use serde::{Deserialize, Serialize};

/// Relative delay as supplied by a producer: a number of milliseconds, or a
/// human duration string such as `"10m"`, `"2 days"` or `"2.5 hrs"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Delay {
    Millis(u64),
    Text(String),
}

impl std::fmt::Display for Delay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delay::Millis(ms) => write!(f, "{}", ms),
            Delay::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Content of a scheduled notification, stored verbatim as JSON in the
/// namespace's payload store.
///
/// Fields other than `message`, `on` and `in` are kept in `extra` so the
/// payload handed to listeners is the one the producer scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default)]
    pub message: String,

    /// Absolute delivery time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,

    /// Relative delivery delay.
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NotificationPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            on: None,
            delay: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Schedule relative to now.
    pub fn deliver_in(mut self, delay: impl Into<String>) -> Self {
        self.delay = Some(Delay::Text(delay.into()));
        self
    }

    /// Schedule at an absolute time.
    pub fn deliver_on(mut self, on: impl Into<String>) -> Self {
        self.on = Some(on.into());
        self
    }

    /// `on`, treating an empty string as absent.
    pub fn scheduled_on(&self) -> Option<&str> {
        self.on.as_deref().filter(|on| !on.is_empty())
    }
}

/// Remaining lifetime of a timer record, as reported by `PTTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i64")]
pub enum TimeToLive {
    /// The key does not exist (never created, cancelled, or already fired).
    Missing,
    /// The key exists without an expiry.
    Persistent,
    /// Milliseconds until the timer fires.
    Remaining(u64),
}

impl TimeToLive {
    pub fn from_pttl(pttl: i64) -> Self {
        match pttl {
            -1 => TimeToLive::Persistent,
            ms if ms >= 0 => TimeToLive::Remaining(ms as u64),
            _ => TimeToLive::Missing,
        }
    }

    pub fn as_pttl(&self) -> i64 {
        match self {
            TimeToLive::Missing => -2,
            TimeToLive::Persistent => -1,
            TimeToLive::Remaining(ms) => *ms as i64,
        }
    }
}

impl From<TimeToLive> for i64 {
    fn from(ttl: TimeToLive) -> Self {
        ttl.as_pttl()
    }
}

/// Consistent snapshot of a notification's timer and payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationState {
    pub ttl: TimeToLive,
    pub payload: Option<NotificationPayload>,
}

/// A notification claimed by this process, handed to local listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveredNotification {
    pub id: String,
    pub payload: NotificationPayload,
}
