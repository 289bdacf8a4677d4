//! Upstream throttling for Reliquary fetchers.
//!
//! Reliquary never retries on its own. What it does do is keep fetchers
//! polite: a [`FetchLimiter`] spaces requests to a source and caps how many
//! run at once, and [`parse_retry_after`] turns an upstream `Retry-After`
//! header into the hint carried by `FetchErrorKind::RateLimited`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod limiter;
mod limits;
mod retry_after;

pub use limiter::{FetchLimiter, FetchLimiterGuard};
pub use limits::SourceLimits;
pub use retry_after::{parse_retry_after, parse_retry_after_value};
