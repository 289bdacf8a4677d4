//! Throttling decorator for fetchers.

use reliquary_core::{FetchOutcome, FetchRequest};
use reliquary_error::FetchError;
use reliquary_interface::Fetcher;
use reliquary_rate_limit::FetchLimiter;

/// Fetcher that waits for a [`FetchLimiter`] slot before delegating.
///
/// The slot is held for the duration of the inner fetch. Failures from the
/// inner fetcher pass through untouched; nothing is retried here.
#[derive(Debug, Clone)]
pub struct ThrottledFetcher<F> {
    inner: F,
    limiter: FetchLimiter,
}

impl<F: Fetcher> ThrottledFetcher<F> {
    /// Wrap `inner` with `limiter`.
    pub fn new(inner: F, limiter: FetchLimiter) -> Self {
        Self { inner, limiter }
    }

    /// The wrapped fetcher.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// The limiter in front of the wrapped fetcher.
    pub fn limiter(&self) -> &FetchLimiter {
        &self.limiter
    }
}

#[async_trait::async_trait]
impl<F: Fetcher> Fetcher for ThrottledFetcher<F> {
    #[tracing::instrument(skip(self, request), fields(fetcher = self.inner.name()))]
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let _guard = self.limiter.acquire().await?;
        self.inner.fetch(request).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
