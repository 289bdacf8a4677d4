//! Content store trait definition.

use bytes::Bytes;
use reliquary_core::{ContentHash, ContentHasher, ContentRecord, MediaKind, PutMetadata};
use reliquary_error::{ReliquaryResult, StorageError, StorageErrorKind};

/// Result of a [`ContentStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    /// The record now on file for the hash
    pub record: ContentRecord,
    /// False when an earlier writer already stored these bytes
    pub newly_stored: bool,
}

/// Trait for pluggable content-addressed stores.
///
/// Implementations must be safe for concurrent use by unrelated requests
/// that converge on the same hash. Writes are idempotent: storing the same
/// bytes twice yields exactly one artifact and the first writer's record.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Look up the record for `hash`.
    ///
    /// # Returns
    ///
    /// `Some(record)` if the content is stored, `None` otherwise
    async fn exists(&self, hash: &ContentHash, kind: MediaKind)
    -> ReliquaryResult<Option<ContentRecord>>;

    /// Store bytes under their hash, or return the existing record.
    ///
    /// An existing record only has `last_requester_id` refreshed. An I/O
    /// failure is returned to the caller and leaves nothing behind that would
    /// block a later retry.
    ///
    /// # Errors
    ///
    /// Fails with `HashMismatch` if `hash` is not the hash of `bytes`.
    async fn put(
        &self,
        hash: &ContentHash,
        kind: MediaKind,
        extension: &str,
        bytes: &Bytes,
        metadata: &PutMetadata,
    ) -> ReliquaryResult<StoredContent>;

    /// Read stored bytes back, verifying their hash.
    async fn retrieve(&self, record: &ContentRecord) -> ReliquaryResult<Bytes>;

    /// Record a durable public location for stored content.
    async fn refresh_location(
        &self,
        hash: &ContentHash,
        kind: MediaKind,
        public_location: &str,
    ) -> ReliquaryResult<ContentRecord>;

    /// Backend name for logs (e.g., "filesystem").
    fn backend_name(&self) -> &'static str;
}

/// Verify content hash matches expected hash.
pub fn verify_hash(data: &[u8], expected: &ContentHash) -> ReliquaryResult<()> {
    let actual = ContentHasher::hash(data);
    if &actual != expected {
        return Err(StorageError::new(StorageErrorKind::HashMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
        .into());
    }
    Ok(())
}
