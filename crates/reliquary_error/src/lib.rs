//! Error types for the Reliquary library.
//!
//! This crate provides the foundation error types used throughout the Reliquary workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Every error type is `Clone`: a failed shared fetch is handed to every
//! caller that was waiting on it.
//!
//! # Examples
//!
//! ```
//! use reliquary_error::{FetchError, FetchErrorKind, FailureCategory, ReliquaryResult};
//!
//! fn fetch_media() -> ReliquaryResult<Vec<u8>> {
//!     Err(FetchError::new(FetchErrorKind::NotFound("https://example.com/a.mp4".into())))?
//! }
//!
//! let err = fetch_media().unwrap_err();
//! assert_eq!(err.category(), FailureCategory::NotFound);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod coalesce;
mod config;
mod delivery;
mod error;
mod fetch;
mod ledger;
mod lifecycle;
mod storage;
mod transform;

pub use coalesce::{CoalesceError, CoalesceErrorKind};
pub use config::ConfigError;
pub use delivery::{DeliveryError, DeliveryErrorKind};
pub use error::{FailureCategory, ReliquaryError, ReliquaryErrorKind, ReliquaryResult};
pub use fetch::{FetchError, FetchErrorKind, RetryableError};
pub use ledger::{LedgerError, LedgerErrorKind};
pub use lifecycle::{LifecycleError, LifecycleErrorKind};
pub use storage::{StorageError, StorageErrorKind};
pub use transform::{TransformError, TransformErrorKind};
