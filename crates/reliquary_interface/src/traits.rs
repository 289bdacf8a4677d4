//! Collaborator traits.

use async_trait::async_trait;
use bytes::Bytes;
use reliquary_core::{
    ContentHash, FetchOutcome, FetchRequest, LedgerRecord, LifecycleRecord, MediaKind,
    PutMetadata, RequestKey, TrimSpec,
};
use reliquary_error::{DeliveryError, FetchError, LedgerError, LifecycleError, TransformError};

/// Downloads media for a request.
///
/// Implementations own error classification: a rate limit must come back as
/// `FetchErrorKind::RateLimited` and vanished content as `NotFound`. The
/// pipeline does not second-guess the class.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the media named by `request`.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError>;

    /// Short name for logs (e.g., "http").
    fn name(&self) -> &str;
}

/// Applies a clip window to media bytes.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Return the clipped bytes.
    async fn transform(
        &self,
        bytes: &Bytes,
        kind: MediaKind,
        extension: &str,
        spec: &TrimSpec,
    ) -> Result<Bytes, TransformError>;
}

/// Delivery channel with a hard size budget.
#[async_trait]
pub trait LimitedChannel: Send + Sync {
    /// Send `bytes` and return a public location.
    async fn send(&self, bytes: &Bytes, suggested_name: &str) -> Result<String, DeliveryError>;

    /// Budget in bytes. Everything assigned to this channel in one plan must
    /// total strictly less than this.
    fn budget_bytes(&self) -> u64;
}

/// Delivery channel without a practical size cap.
#[async_trait]
pub trait UnlimitedChannel: Send + Sync {
    /// Upload `bytes` under their content hash and return a public location.
    async fn send(
        &self,
        bytes: &Bytes,
        content_hash: &ContentHash,
        extension: &str,
        metadata: &PutMetadata,
    ) -> Result<String, DeliveryError>;
}

/// Durable request-key to delivered-location mapping.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Look up a fully delivered request.
    async fn lookup(&self, key: &RequestKey) -> Result<Option<LedgerRecord>, LedgerError>;

    /// Durably record a delivered request.
    async fn record(&self, record: LedgerRecord) -> Result<(), LedgerError>;
}

/// Receives lifecycle transitions.
///
/// Delivery is fire-and-forget: a failing sink never fails a request.
#[async_trait]
pub trait LifecycleSink: Send + Sync {
    /// Accept one transition.
    async fn emit(&self, record: &LifecycleRecord) -> Result<(), LifecycleError>;
}
