//! Trait definitions for the collaborators the pipeline drives.
//!
//! The pipeline owns coalescing, dedup, transform policy and delivery
//! planning. Everything that touches the outside world (downloading, trimming,
//! sending, durable records, observability) sits behind one of these traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;

pub use traits::{Fetcher, Ledger, LifecycleSink, LimitedChannel, Transformer, UnlimitedChannel};
