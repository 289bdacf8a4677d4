//! `Retry-After` header parsing.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Read the wait hint from a `Retry-After` header.
///
/// Accepts both forms the header allows: delay seconds (`120`) and an HTTP
/// date (`Wed, 21 Oct 2015 07:28:00 GMT`). A date in the past yields a zero
/// wait. Returns `None` when the header is absent or unreadable.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after_value(value, Utc::now())
}

/// Parse one `Retry-After` value relative to `now`.
///
/// # Example
///
/// ```
/// use reliquary_rate_limit::parse_retry_after_value;
/// use std::time::Duration;
///
/// let now = chrono::Utc::now();
/// assert_eq!(parse_retry_after_value("30", now), Some(Duration::from_secs(30)));
/// assert_eq!(parse_retry_after_value("soon", now), None);
/// ```
pub fn parse_retry_after_value(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
    tracing::trace!(wait_secs = wait.as_secs(), "Parsed Retry-After date");
    Some(wait)
}
