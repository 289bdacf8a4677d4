//! Fetch collaborators for Reliquary.
//!
//! - [`HttpFetcher`] downloads direct media URLs and classifies upstream
//!   failures into the `FetchErrorKind` taxonomy.
//! - [`ThrottledFetcher`] wraps any [`Fetcher`](reliquary_interface::Fetcher)
//!   with a [`FetchLimiter`](reliquary_rate_limit::FetchLimiter).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod classify;
mod http;
mod throttled;

pub use classify::{classify_status, detect_media};
pub use http::HttpFetcher;
pub use throttled::ThrottledFetcher;
