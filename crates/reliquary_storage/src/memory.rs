//! In-memory content store.

use crate::{ContentStore, StoredContent, verify_hash};
use bytes::Bytes;
use chrono::Utc;
use reliquary_core::{ContentHash, ContentRecord, MediaKind, PutMetadata};
use reliquary_error::{ReliquaryResult, StorageError, StorageErrorKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Content store held in process memory.
///
/// Intended for tests and short-lived tools. Supports injecting write
/// failures to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    entries: RwLock<HashMap<(ContentHash, MediaKind), (ContentRecord, Bytes)>>,
    physical_writes: AtomicUsize,
    put_calls: AtomicUsize,
    failing_puts: AtomicUsize,
}

impl MemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `put` fail with a write error.
    pub fn fail_next_puts(&self, count: usize) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    /// Number of artifacts actually written (not deduplicated).
    pub fn physical_writes(&self) -> usize {
        self.physical_writes.load(Ordering::SeqCst)
    }

    /// Number of `put` calls received, deduplicated or not.
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Number of distinct artifacts held.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryContentStore {
    async fn exists(
        &self,
        hash: &ContentHash,
        kind: MediaKind,
    ) -> ReliquaryResult<Option<ContentRecord>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(hash.clone(), kind))
            .map(|(record, _)| record.clone()))
    }

    async fn put(
        &self,
        hash: &ContentHash,
        kind: MediaKind,
        extension: &str,
        bytes: &Bytes,
        metadata: &PutMetadata,
    ) -> ReliquaryResult<StoredContent> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        verify_hash(bytes, hash)?;

        if self.take_injected_failure() {
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "injected failure for {}",
                hash.short()
            )))
            .into());
        }

        let mut entries = self.entries.write().await;
        if let Some((record, _)) = entries.get_mut(&(hash.clone(), kind)) {
            if let Some(requester) = metadata.requester_id() {
                record.last_requester_id = Some(requester.clone());
            }
            return Ok(StoredContent {
                record: record.clone(),
                newly_stored: false,
            });
        }

        let record = ContentRecord {
            content_hash: hash.clone(),
            kind,
            extension: extension.to_string(),
            stored_location: format!("memory://{}/{}.{}", kind.dir_name(), hash, extension),
            public_location: None,
            size_bytes: bytes.len() as u64,
            created_at: Utc::now(),
            last_requester_id: metadata.requester_id().clone(),
        };
        entries.insert((hash.clone(), kind), (record.clone(), bytes.clone()));
        self.physical_writes.fetch_add(1, Ordering::SeqCst);

        Ok(StoredContent {
            record,
            newly_stored: true,
        })
    }

    async fn retrieve(&self, record: &ContentRecord) -> ReliquaryResult<Bytes> {
        let entries = self.entries.read().await;
        let (_, bytes) = entries
            .get(&(record.content_hash.clone(), record.kind))
            .ok_or_else(|| {
                StorageError::new(StorageErrorKind::NotFound(record.stored_location.clone()))
            })?;
        verify_hash(bytes, &record.content_hash)?;
        Ok(bytes.clone())
    }

    async fn refresh_location(
        &self,
        hash: &ContentHash,
        kind: MediaKind,
        public_location: &str,
    ) -> ReliquaryResult<ContentRecord> {
        let mut entries = self.entries.write().await;
        let (record, _) = entries.get_mut(&(hash.clone(), kind)).ok_or_else(|| {
            StorageError::new(StorageErrorKind::NotFound(hash.to_string()))
        })?;
        record.public_location = Some(public_location.to_string());
        Ok(record.clone())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
