//! Core data types for the Reliquary media acquisition pipeline.
//!
//! This crate provides the value types shared by every other Reliquary crate:
//! content identity, request identity, fetched payloads, stored records and
//! lifecycle records.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod delivery;
mod hash;
mod lifecycle;
mod media;
mod payload;
mod record;
mod request;
mod telemetry;

pub use delivery::{ChannelKind, DeliveredLocation};
pub use hash::{ContentHash, ContentHasher};
pub use lifecycle::{LifecyclePhase, LifecycleRecord, RequestId};
pub use media::MediaKind;
pub use payload::{FetchOutcome, MediaPayload};
pub use record::{ContentRecord, LedgerRecord, PutMetadata, PutMetadataBuilder};
pub use request::{FetchRequest, RequestKey, TrimSpec};
pub use telemetry::{init_telemetry, shutdown_telemetry};
