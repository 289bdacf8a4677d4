//! Single-flight request coalescing.
//!
//! [`RequestCoalescer`] guarantees at most one outstanding operation per
//! [`RequestKey`](reliquary_core::RequestKey). Every caller that asks for a
//! key while its operation is running subscribes to that operation and
//! receives an identical clone of its result.
//!
//! The pending table is an explicit value owned by whoever constructs it;
//! there is no process-wide state.
//!
//! # Example
//!
//! ```rust
//! use reliquary_coalesce::RequestCoalescer;
//! use reliquary_core::RequestKey;
//! use reliquary_error::CoalesceError;
//!
//! # async fn example() {
//! let coalescer: RequestCoalescer<u64, CoalesceError> = RequestCoalescer::new();
//! let key = RequestKey::derive("https://example.com/a.gif", None);
//!
//! let value = coalescer
//!     .acquire(key, || async { Ok::<_, CoalesceError>(42) })
//!     .await
//!     .unwrap();
//! assert_eq!(value, 42);
//! assert_eq!(coalescer.in_flight(), 0);
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod coalescer;

pub use coalescer::RequestCoalescer;
