//! Top-level error wrapper types.

use crate::{
    CoalesceError, CoalesceErrorKind, ConfigError, DeliveryError, FetchError, FetchErrorKind,
    LedgerError, LifecycleError, RetryableError, StorageError, TransformError,
};
use std::time::Duration;

/// Every error the workspace can surface.
///
/// # Examples
///
/// ```
/// use reliquary_error::{ReliquaryError, ConfigError};
///
/// let err: ReliquaryError = ConfigError::new("missing webhook_url").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, Clone, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum ReliquaryErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Fetch collaborator failure
    #[from(FetchError)]
    Fetch(FetchError),
    /// Transform collaborator failure
    #[from(TransformError)]
    Transform(TransformError),
    /// Content store failure
    #[from(StorageError)]
    Storage(StorageError),
    /// Delivery failure after the fallback cascade
    #[from(DeliveryError)]
    Delivery(DeliveryError),
    /// Ledger failure
    #[from(LedgerError)]
    Ledger(LedgerError),
    /// Single-flight waiter failure
    #[from(CoalesceError)]
    Coalesce(CoalesceError),
    /// Lifecycle log failure
    #[from(LifecycleError)]
    Lifecycle(LifecycleError),
}

/// The one terminal category a caller is shown for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum FailureCategory {
    /// Upstream rate limit; retry after the hint
    #[display("rate_limited")]
    RateLimited,
    /// Upstream content is gone
    #[display("not_found")]
    NotFound,
    /// Any other fetch failure
    #[display("fetch_failed")]
    Fetch,
    /// Content store write or read failed
    #[display("storage_failed")]
    Storage,
    /// Both delivery channels failed for at least one item
    #[display("delivery_failed")]
    Delivery,
    /// Delivered, but the durable record could not be written
    #[display("ledger_failed")]
    Ledger,
    /// This caller's own wait timed out
    #[display("timed_out")]
    TimedOut,
    /// The shared operation went away (shutdown, panic)
    #[display("cancelled")]
    Cancelled,
    /// Misconfiguration or internal invariant violation
    #[display("internal")]
    Internal,
}

/// Reliquary error with kind discrimination.
///
/// # Examples
///
/// ```
/// use reliquary_error::{ReliquaryResult, ConfigError};
///
/// fn might_fail() -> ReliquaryResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// match might_fail() {
///     Ok(_) => println!("Success"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Reliquary Error: {}", _0)]
pub struct ReliquaryError(Box<ReliquaryErrorKind>);

impl ReliquaryError {
    /// Create a new error from a kind.
    pub fn new(kind: ReliquaryErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ReliquaryErrorKind {
        &self.0
    }

    /// Collapse this error into the category a caller sees.
    pub fn category(&self) -> FailureCategory {
        match self.kind() {
            ReliquaryErrorKind::Fetch(e) => match e.kind {
                FetchErrorKind::RateLimited { .. } => FailureCategory::RateLimited,
                FetchErrorKind::NotFound(_) => FailureCategory::NotFound,
                FetchErrorKind::Unsupported(_) | FetchErrorKind::Upstream(_) => {
                    FailureCategory::Fetch
                }
            },
            ReliquaryErrorKind::Storage(_) => FailureCategory::Storage,
            ReliquaryErrorKind::Delivery(_) => FailureCategory::Delivery,
            ReliquaryErrorKind::Ledger(_) => FailureCategory::Ledger,
            ReliquaryErrorKind::Coalesce(e) => match e.kind {
                CoalesceErrorKind::TimedOut(_) => FailureCategory::TimedOut,
                CoalesceErrorKind::Abandoned(_) | CoalesceErrorKind::Panicked => {
                    FailureCategory::Cancelled
                }
            },
            // Transform failures are absorbed by the transform stage; seeing one
            // here means a caller used a transformer directly.
            ReliquaryErrorKind::Transform(_)
            | ReliquaryErrorKind::Config(_)
            | ReliquaryErrorKind::Lifecycle(_) => FailureCategory::Internal,
        }
    }
}

impl RetryableError for ReliquaryError {
    fn is_retryable(&self) -> bool {
        match self.kind() {
            ReliquaryErrorKind::Fetch(e) => e.is_retryable(),
            // Idempotent writes; retrying the whole request is safe.
            ReliquaryErrorKind::Storage(_) | ReliquaryErrorKind::Ledger(_) => true,
            ReliquaryErrorKind::Coalesce(e) => matches!(e.kind, CoalesceErrorKind::TimedOut(_)),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self.kind() {
            ReliquaryErrorKind::Fetch(e) => e.retry_after(),
            _ => None,
        }
    }
}

// Generic From implementation for any type that converts to ReliquaryErrorKind
impl<T> From<T> for ReliquaryError
where
    T: Into<ReliquaryErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Reliquary operations.
pub type ReliquaryResult<T> = std::result::Result<T, ReliquaryError>;
