//! Fetch error types and retry hints.

use std::fmt;
use std::time::Duration;

/// Failure classes reported by a fetch collaborator.
///
/// Classification belongs to the fetcher. The pipeline trusts it and never
/// tries to turn an ambiguous upstream signal into a different class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Upstream asked us to slow down.
    RateLimited {
        /// Minimum wait before retrying, when upstream supplied one
        retry_after: Option<Duration>,
    },
    /// Upstream says the content does not exist (or no longer exists)
    NotFound(String),
    /// Upstream answered with something other than media
    Unsupported(String),
    /// Any other upstream or transport failure
    Upstream(String),
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::RateLimited {
                retry_after: Some(wait),
            } => write!(f, "Rate limited: retry after {}s", wait.as_secs()),
            FetchErrorKind::RateLimited { retry_after: None } => write!(f, "Rate limited"),
            FetchErrorKind::NotFound(source) => write!(f, "Content not found: {}", source),
            FetchErrorKind::Unsupported(detail) => write!(f, "Unsupported content: {}", detail),
            FetchErrorKind::Upstream(detail) => write!(f, "Upstream failure: {}", detail),
        }
    }
}

/// Fetch error with source location tracking.
///
/// # Examples
///
/// ```
/// use reliquary_error::{FetchError, FetchErrorKind, RetryableError};
/// use std::time::Duration;
///
/// let err = FetchError::new(FetchErrorKind::RateLimited {
///     retry_after: Some(Duration::from_secs(30)),
/// });
/// assert!(err.is_retryable());
/// assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Fetch Error: {} at line {} in {}", kind, line, file)]
pub struct FetchError {
    /// The kind of error that occurred
    pub kind: FetchErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl FetchError {
    /// Create a new FetchError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: FetchErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a rate-limited failure.
    #[track_caller]
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::new(FetchErrorKind::RateLimited { retry_after })
    }
}

/// Trait for errors that a caller may choose to retry.
///
/// Nothing inside the pipeline retries on its own; this only tells the
/// caller whether a retry makes sense and how long to wait first.
pub trait RetryableError {
    /// Returns true if retrying the same request later may succeed.
    fn is_retryable(&self) -> bool;

    /// Minimum wait before a retry, if the failure carried one.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl RetryableError for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self.kind, FetchErrorKind::RateLimited { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self.kind {
            FetchErrorKind::RateLimited { retry_after } => retry_after,
            _ => None,
        }
    }
}
