//! Payload validation and delivery-time resolution.
//!
//! A payload schedules itself with `on` (absolute time) or `in` (relative
//! delay). `on` wins when both are present; with neither the notification is
//! due immediately.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use ossa_common::error::AppError;
use ossa_common::types::{Delay, NotificationPayload};

const SECOND_MS: f64 = 1_000.0;
const MINUTE_MS: f64 = SECOND_MS * 60.0;
const HOUR_MS: f64 = MINUTE_MS * 60.0;
const DAY_MS: f64 = HOUR_MS * 24.0;
const WEEK_MS: f64 = DAY_MS * 7.0;
const YEAR_MS: f64 = DAY_MS * 365.25;

/// Furthest delay accepted, in milliseconds. Redis rejects expiries whose
/// absolute millisecond time overflows an `i64`, so this leaves room for
/// the current time to be added.
pub const MAX_DELAY_MS: u64 = (i64::MAX / 1000) as u64;

/// Longest duration string accepted.
const MAX_DURATION_LEN: usize = 100;

/// Naive layouts accepted for `on`, interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// When a notification becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Due on the store's next expiry cycle.
    Immediate,
    After(Duration),
    At(DateTime<Utc>),
}

impl Expiry {
    /// Whole seconds until the expiry, rounded to the nearest second.
    pub fn ttl_seconds(&self, now: DateTime<Utc>) -> u64 {
        match self {
            Expiry::Immediate => 0,
            Expiry::After(delay) => delay.as_secs_f64().round() as u64,
            Expiry::At(at) => {
                let millis = (*at - now).num_milliseconds().max(0);
                (millis as f64 / SECOND_MS).round() as u64
            }
        }
    }
}

/// Reject payloads without a non-empty `message`.
pub fn validate_message(payload: &NotificationPayload) -> Result<(), AppError> {
    if payload.message.is_empty() {
        return Err(AppError::Validation(
            "[payload.message] The message must be a non-empty string".into(),
        ));
    }
    Ok(())
}

/// Validate a payload and work out when it is due, relative to `now`.
pub fn resolve(payload: &NotificationPayload, now: DateTime<Utc>) -> Result<Expiry, AppError> {
    validate_message(payload)?;

    if let Some(on) = payload.scheduled_on() {
        let at = parse_datetime(on).ok_or_else(|| {
            AppError::Validation(format!("[payload.on] Invalid date format: '{}'", on))
        })?;
        if at <= now {
            return Err(AppError::Validation(format!(
                "[payload.on] Datetime must be a future Datetime: '{}'",
                on
            )));
        }
        if (at - now).num_milliseconds() as u64 > MAX_DELAY_MS {
            return Err(AppError::Validation(format!(
                "[payload.on] Datetime is too far in the future: '{}'",
                on
            )));
        }
        return Ok(Expiry::At(at));
    }

    let delay = match &payload.delay {
        None => return Ok(Expiry::Immediate),
        Some(Delay::Text(text)) if text.is_empty() => return Ok(Expiry::Immediate),
        Some(Delay::Millis(ms)) => Duration::from_millis(*ms),
        Some(Delay::Text(text)) => parse_duration(text).ok_or_else(|| {
            AppError::Validation(format!("[payload.in] Invalid duration: '{}'", text))
        })?,
    };

    if delay.as_millis() > u128::from(MAX_DELAY_MS) {
        return Err(AppError::Validation(format!(
            "[payload.in] Delay exceeds {} ms",
            MAX_DELAY_MS
        )));
    }
    Ok(Expiry::After(delay))
}

/// Parse a duration such as `"100"`, `"5s"`, `"10m"`, `"2.5 hrs"` or `"2 days"`.
///
/// A bare number is milliseconds. Units are case-insensitive and may be
/// separated from the number by spaces.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() > MAX_DURATION_LEN {
        return None;
    }

    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    if !number.bytes().any(|b| b.is_ascii_digit()) || number.ends_with('.') {
        return None;
    }
    let value: f64 = number.parse().ok()?;

    let factor = match unit.trim_start().to_ascii_lowercase().as_str() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => SECOND_MS,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE_MS,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR_MS,
        "d" | "day" | "days" => DAY_MS,
        "w" | "week" | "weeks" => WEEK_MS,
        "y" | "yr" | "yrs" | "year" | "years" => YEAR_MS,
        _ => return None,
    };

    let nanos = (value * factor * 1_000_000.0).round();
    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos as u64))
}

/// Parse an absolute time: RFC 3339, a naive date-time (UTC), or a bare date
/// (UTC midnight).
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("100"), Some(Duration::from_millis(100)));
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("10h"), Some(Duration::from_secs(36_000)));
        assert_eq!(parse_duration("2.5 hrs"), Some(Duration::from_secs(9_000)));
        assert_eq!(parse_duration("2 days"), Some(Duration::from_secs(172_800)));
        assert_eq!(parse_duration("1d"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_duration("1 Week"), Some(Duration::from_secs(604_800)));
        assert_eq!(parse_duration("1y"), Some(Duration::from_secs(31_557_600)));
        assert_eq!(parse_duration(".5s"), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("ms"), None);
        assert_eq!(parse_duration("-5s"), None);
        assert_eq!(parse_duration("1h30m"), None);
        assert_eq!(parse_duration("5 fortnights"), None);
        assert_eq!(parse_duration(&"9".repeat(101)), None);
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        // About 584 years of nanoseconds fit in a u64.
        assert_eq!(parse_duration("600y"), None);
        assert_eq!(parse_duration("99999999999999999999 years"), None);
        assert!(parse_duration("500y").is_some());
    }

    #[test]
    fn test_parse_datetime_layouts() {
        let expected = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_datetime("2030-01-02T03:04:05Z"), Some(expected));
        assert_eq!(parse_datetime("2030-01-02T05:04:05+02:00"), Some(expected));
        assert_eq!(parse_datetime("2030-01-02 03:04:05"), Some(expected));
        assert_eq!(
            parse_datetime("2030-01-02"),
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_datetime("not-a-date"), None);
    }

    #[test]
    fn test_resolve_rejects_empty_message() {
        let payload = NotificationPayload::new("").deliver_in("1s");
        assert!(matches!(resolve(&payload, now()), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_resolve_rejects_invalid_and_past_dates() {
        let invalid = NotificationPayload::new("x").deliver_on("not-a-date");
        assert!(matches!(resolve(&invalid, now()), Err(AppError::Validation(_))));

        let past = NotificationPayload::new("x").deliver_on("2000-01-01");
        assert!(matches!(resolve(&past, now()), Err(AppError::Validation(_))));

        let exactly_now = NotificationPayload::new("x").deliver_on("2026-03-01T12:00:00Z");
        assert!(matches!(resolve(&exactly_now, now()), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_resolve_rejects_invalid_duration() {
        let payload = NotificationPayload::new("x").deliver_in("whenever");
        assert!(matches!(resolve(&payload, now()), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_resolve_rejects_delays_redis_cannot_store() {
        let mut numeric = NotificationPayload::new("x");
        numeric.delay = Some(Delay::Millis(u64::MAX));
        assert!(matches!(resolve(&numeric, now()), Err(AppError::Validation(_))));

        numeric.delay = Some(Delay::Millis(MAX_DELAY_MS + 1));
        assert!(matches!(resolve(&numeric, now()), Err(AppError::Validation(_))));

        numeric.delay = Some(Delay::Millis(MAX_DELAY_MS));
        let expiry = resolve(&numeric, now()).unwrap();
        assert!(expiry.ttl_seconds(now()) <= (i64::MAX / 1000) as u64);
    }

    #[test]
    fn test_resolve_on_takes_precedence() {
        let payload = NotificationPayload::new("x")
            .deliver_on("2026-03-01T12:10:00Z")
            .deliver_in("1s");
        let expiry = resolve(&payload, now()).unwrap();
        assert_eq!(
            expiry,
            Expiry::At(Utc.with_ymd_and_hms(2026, 3, 1, 12, 10, 0).unwrap())
        );
        assert_eq!(expiry.ttl_seconds(now()), 600);
    }

    #[test]
    fn test_resolve_relative_and_immediate() {
        let payload = NotificationPayload::new("x").deliver_in("10m");
        let expiry = resolve(&payload, now()).unwrap();
        assert_eq!(expiry, Expiry::After(Duration::from_secs(600)));
        assert_eq!(expiry.ttl_seconds(now()), 600);

        let mut numeric = NotificationPayload::new("x");
        numeric.delay = Some(Delay::Millis(1_600));
        assert_eq!(resolve(&numeric, now()).unwrap().ttl_seconds(now()), 2);

        let immediate = NotificationPayload::new("x");
        assert_eq!(resolve(&immediate, now()).unwrap(), Expiry::Immediate);
        assert_eq!(Expiry::Immediate.ttl_seconds(now()), 0);
    }

    #[test]
    fn test_ttl_seconds_rounds_absolute_times() {
        let at = now() + chrono::Duration::milliseconds(2_400);
        assert_eq!(Expiry::At(at).ttl_seconds(now()), 2);

        let at = now() + chrono::Duration::milliseconds(2_600);
        assert_eq!(Expiry::At(at).ttl_seconds(now()), 3);
    }
}
