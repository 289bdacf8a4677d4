//! Request limiter built on governor and a Tokio semaphore.
//!
//! - Governor (GCRA) spaces requests to the configured RPM
//! - A semaphore caps requests in flight

use crate::SourceLimits;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use reliquary_error::{FetchError, FetchErrorKind};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Throttle for one upstream source.
///
/// Cloning shares the underlying quota, so every clone draws from the same
/// budget.
///
/// # Example
///
/// ```rust
/// use reliquary_rate_limit::{FetchLimiter, SourceLimits};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = FetchLimiter::new(SourceLimits {
///     rpm: Some(60),
///     max_concurrent: Some(2),
/// });
///
/// let guard = limiter.acquire().await?;
/// // fetch...
/// drop(guard);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FetchLimiter {
    limits: SourceLimits,
    rpm_limiter: Option<Arc<DirectRateLimiter>>,
    concurrent: Option<Arc<Semaphore>>,
}

impl FetchLimiter {
    /// Create a limiter enforcing every bound set in `limits`.
    pub fn new(limits: SourceLimits) -> Self {
        let rpm_limiter = limits
            .rpm
            .and_then(NonZeroU32::new)
            .map(|n| Arc::new(GovernorRateLimiter::direct(Quota::per_minute(n))));

        let concurrent = limits
            .max_concurrent
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n as usize)));

        tracing::debug!(rpm = ?limits.rpm, max_concurrent = ?limits.max_concurrent, "Created fetch limiter");
        Self {
            limits,
            rpm_limiter,
            concurrent,
        }
    }

    /// The limits this limiter enforces.
    pub fn limits(&self) -> &SourceLimits {
        &self.limits
    }

    /// Wait until a request may start.
    ///
    /// The returned guard holds the concurrency slot until dropped.
    #[tracing::instrument(skip(self))]
    pub async fn acquire(&self) -> Result<FetchLimiterGuard, FetchError> {
        if let Some(limiter) = &self.rpm_limiter {
            limiter.until_ready().await;
        }

        // Slot last so a caller never holds one while waiting on the rate.
        let permit = match &self.concurrent {
            Some(semaphore) => Some(semaphore.clone().acquire_owned().await.map_err(|_| {
                FetchError::new(FetchErrorKind::Upstream("fetch limiter closed".to_string()))
            })?),
            None => None,
        };

        Ok(FetchLimiterGuard { _permit: permit })
    }

    /// Take a slot without waiting, if every bound allows it now.
    pub fn try_acquire(&self) -> Option<FetchLimiterGuard> {
        // Take the slot first so a refused slot does not burn rate quota.
        let permit = match &self.concurrent {
            Some(semaphore) => Some(semaphore.clone().try_acquire_owned().ok()?),
            None => None,
        };

        if let Some(limiter) = &self.rpm_limiter {
            limiter.check().ok()?;
        }

        Some(FetchLimiterGuard { _permit: permit })
    }

    /// Slots currently free, or `None` when concurrency is unbounded.
    pub fn available_slots(&self) -> Option<usize> {
        self.concurrent.as_ref().map(|s| s.available_permits())
    }
}

impl std::fmt::Debug for FetchLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchLimiter")
            .field("limits", &self.limits)
            .field("available_slots", &self.available_slots())
            .finish()
    }
}

/// RAII guard returned by [`FetchLimiter::acquire`].
///
/// Releases the concurrency slot when dropped, including on panic.
#[derive(Debug)]
pub struct FetchLimiterGuard {
    _permit: Option<OwnedSemaphorePermit>,
}
