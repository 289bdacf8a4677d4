//! Tests for fetch throttling and Retry-After parsing.

use chrono::{TimeZone, Utc};
use reliquary_rate_limit::{FetchLimiter, SourceLimits, parse_retry_after, parse_retry_after_value};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use std::time::Duration;

#[test]
fn test_retry_after_seconds() {
    let mut headers = HeaderMap::new();
    headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
    assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(120)));
}

#[test]
fn test_retry_after_http_date() {
    let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
    assert_eq!(
        parse_retry_after_value("Wed, 21 Oct 2015 07:28:00 GMT", now),
        Some(Duration::from_secs(60))
    );
}

#[test]
fn test_retry_after_past_date_is_zero() {
    let now = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
    assert_eq!(
        parse_retry_after_value("Wed, 21 Oct 2015 07:28:00 GMT", now),
        Some(Duration::ZERO)
    );
}

#[test]
fn test_retry_after_missing_or_garbage() {
    assert_eq!(parse_retry_after(&HeaderMap::new()), None);

    let mut headers = HeaderMap::new();
    headers.insert(RETRY_AFTER, HeaderValue::from_static("later please"));
    assert_eq!(parse_retry_after(&headers), None);
}

#[test]
fn test_source_limits_deserialize_defaults() {
    let limits: SourceLimits = serde_json::from_str("{}").unwrap();
    assert_eq!(limits, SourceLimits::unlimited());
    assert!(!limits.is_limited());

    let limits: SourceLimits = serde_json::from_str(r#"{"rpm": 30}"#).unwrap();
    assert_eq!(limits.rpm, Some(30));
    assert!(limits.is_limited());
}

#[tokio::test]
async fn test_concurrency_slots_released_on_drop() {
    let limiter = FetchLimiter::new(SourceLimits {
        rpm: None,
        max_concurrent: Some(2),
    });

    let first = limiter.acquire().await.unwrap();
    let second = limiter.acquire().await.unwrap();
    assert_eq!(limiter.available_slots(), Some(0));
    assert!(limiter.try_acquire().is_none());

    drop(first);
    assert_eq!(limiter.available_slots(), Some(1));
    assert!(limiter.try_acquire().is_some());
    drop(second);
}

#[tokio::test]
async fn test_rpm_quota_blocks_burst() {
    let limiter = FetchLimiter::new(SourceLimits {
        rpm: Some(1),
        max_concurrent: None,
    });

    assert!(limiter.try_acquire().is_some());
    assert!(limiter.try_acquire().is_none(), "second request inside the minute");
}

#[tokio::test]
async fn test_unlimited_never_blocks() {
    let limiter = FetchLimiter::new(SourceLimits::unlimited());
    assert_eq!(limiter.available_slots(), None);
    for _ in 0..100 {
        assert!(limiter.try_acquire().is_some());
    }
}

#[tokio::test]
async fn test_clones_share_quota() {
    let limiter = FetchLimiter::new(SourceLimits {
        rpm: None,
        max_concurrent: Some(1),
    });
    let clone = limiter.clone();

    let _held = limiter.acquire().await.unwrap();
    assert!(clone.try_acquire().is_none());
}
