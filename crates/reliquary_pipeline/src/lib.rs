//! Acquisition pipeline for Reliquary.
//!
//! [`Orchestrator`] composes the pieces into one operation,
//! [`Orchestrator::acquire_and_deliver`]:
//!
//! 1. Ledger lookup; a hit returns the recorded locations without fetching.
//! 2. Single-flight acquisition under the request key.
//! 3. Fetch, then per payload: optional trim, re-hash, store commit.
//! 4. Greedy delivery planning with limited-to-unlimited fallback.
//! 5. Ledger record, then `success`.
//!
//! Every request is tracked through `pending -> running -> {success, error}`
//! in a [`LifecycleLog`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod ffmpeg;
mod lifecycle;
mod orchestrator;
mod transform;

pub use ffmpeg::FfmpegTrimmer;
pub use lifecycle::{
    CollectingLifecycleSink, DEFAULT_RETAINED_HISTORIES, LifecycleLog, TracingLifecycleSink,
};
pub use orchestrator::{
    AcquireOrigin, AcquireOutcome, Collaborators, CollaboratorsBuilder, CollaboratorsBuilderError,
    Orchestrator, OrchestratorSettings,
};
pub use transform::{TransformOutput, TransformStage};
