//! Reliquary - coalesced, deduplicated media acquisition
//!
//! Many concurrent callers ask for the same remote media; Reliquary fetches it
//! once, stores each distinct byte sequence once, and delivers it through the
//! cheapest channel that fits.
//!
//! # Features
//!
//! - **Single-flight**: Identical in-flight requests share one acquisition
//! - **Content-addressed dedup**: Bytes are stored and uploaded once per hash
//! - **Trim with re-hash**: Transformed output gets its own identity
//! - **Budgeted delivery**: Greedy packing onto a size-limited channel with
//!   fallback to an unlimited one
//! - **Ledger**: Delivered requests short-circuit on repeat
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use reliquary::{ReliquaryConfig, assemble, init_telemetry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_telemetry("reliquary")?;
//!     let config = ReliquaryConfig::load()?;
//!     let orchestrator = assemble(&config).await?;
//!
//!     let outcome = orchestrator
//!         .acquire_and_deliver("https://example.com/clip.mp4", None, "user-42")
//!         .await?;
//!     for location in outcome.locations() {
//!         println!("{} via {}", location.location, location.channel);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `reliquary_error` - Error types and failure categories
//! - `reliquary_core` - Hashes, keys, records, lifecycle types, telemetry
//! - `reliquary_interface` - Collaborator traits
//! - `reliquary_storage` - Content stores and ledgers
//! - `reliquary_rate_limit` - Fetch politeness limiter
//! - `reliquary_fetch` - HTTP fetcher
//! - `reliquary_coalesce` - Single-flight coalescer
//! - `reliquary_delivery` - Planning, cascade and channels
//! - `reliquary_pipeline` - Transform stage, lifecycle log, orchestrator
//!
//! This crate re-exports everything and adds configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod assemble;
mod config;

pub use assemble::assemble;
pub use config::{
    CoalesceConfig, DEFAULT_LIMITED_BUDGET, DeliveryConfig, FetchConfig, LedgerConfig,
    LifecycleConfig, ReliquaryConfig, StorageConfig, TransformConfig,
};

pub use reliquary_error::{
    CoalesceError, CoalesceErrorKind, ConfigError, DeliveryError, DeliveryErrorKind,
    FailureCategory, FetchError, FetchErrorKind, LedgerError, LedgerErrorKind, LifecycleError,
    LifecycleErrorKind, ReliquaryError, ReliquaryErrorKind, ReliquaryResult, RetryableError,
    StorageError, StorageErrorKind, TransformError, TransformErrorKind,
};

pub use reliquary_core::{
    ChannelKind, ContentHash, ContentHasher, ContentRecord, DeliveredLocation, FetchOutcome,
    FetchRequest, LedgerRecord, LifecyclePhase, LifecycleRecord, MediaKind, MediaPayload,
    PutMetadata, PutMetadataBuilder, RequestId, RequestKey, TrimSpec, init_telemetry,
    shutdown_telemetry,
};

pub use reliquary_interface::{
    Fetcher, Ledger, LifecycleSink, LimitedChannel, Transformer, UnlimitedChannel,
};

pub use reliquary_storage::{
    ContentStore, FileSystemContentStore, JsonFileLedger, MemoryContentStore, MemoryLedger,
    StoredContent,
};

pub use reliquary_rate_limit::{FetchLimiter, SourceLimits};

pub use reliquary_fetch::{HttpFetcher, ThrottledFetcher};

pub use reliquary_coalesce::RequestCoalescer;

pub use reliquary_delivery::{
    DeliveryExecutor, DeliveryItem, DeliveryPlan, DestinationPlanner, DiscordWebhookChannel,
    FileSystemColdStore, PlannedDelivery, cascade_for, first_success,
};

pub use reliquary_pipeline::{
    AcquireOrigin, AcquireOutcome, Collaborators, CollaboratorsBuilder, CollectingLifecycleSink,
    DEFAULT_RETAINED_HISTORIES, FfmpegTrimmer, LifecycleLog, Orchestrator, OrchestratorSettings, TracingLifecycleSink,
    TransformOutput, TransformStage,
};
