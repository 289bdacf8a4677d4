//! Filesystem-based content store.
//!
//! This backend stores media files in a content-addressable filesystem structure,
//! organized by media kind and content hash for automatic deduplication.

use crate::{ContentStore, StoredContent, verify_hash};
use bytes::Bytes;
use chrono::Utc;
use reliquary_core::{ContentHash, ContentRecord, MediaKind, PutMetadata};
use reliquary_error::{ReliquaryResult, StorageError, StorageErrorKind};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Lock stripes guarding sidecar read-modify-write cycles.
const RECORD_LOCK_STRIPES: usize = 64;

/// Filesystem content store.
///
/// Stores each artifact next to a JSON sidecar holding its [`ContentRecord`]:
/// `{base_path}/{kind}/{hash[0:2]}/{hash[2:4]}/{hash}.{ext}` and `{hash}.json`.
///
/// # Example Structure
///
/// ```text
/// /var/reliquary/media/
/// ├── gifs/
/// │   └── ab/
/// │       └── cd/
/// │           ├── abcdef123456....gif
/// │           └── abcdef123456....json
/// ├── images/
/// └── video/
/// ```
///
/// The sidecar is the source of truth for "does this content exist". It is
/// published with a hard link, which fails if the target exists, so the first
/// writer's record wins and readers never see a half-written record.
/// Later edits to a record (requester, public location) are serialized per
/// hash within the process so neither overwrites the other.
pub struct FileSystemContentStore {
    base_path: PathBuf,
    record_locks: Vec<Mutex<()>>,
}

impl FileSystemContentStore {
    /// Create a new filesystem content store.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or accessed.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>) -> ReliquaryResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;

        tracing::info!(path = %base_path.display(), "Created filesystem content store");
        Ok(Self {
            base_path,
            record_locks: (0..RECORD_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        })
    }

    /// Root directory of the store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn shard_dir(&self, hash: &ContentHash, kind: MediaKind) -> PathBuf {
        let (a, b) = hash.shard();
        self.base_path.join(kind.dir_name()).join(a).join(b)
    }

    fn artifact_path(&self, hash: &ContentHash, kind: MediaKind, extension: &str) -> PathBuf {
        self.shard_dir(hash, kind)
            .join(format!("{}.{}", hash, extension))
    }

    fn record_path(&self, hash: &ContentHash, kind: MediaKind) -> PathBuf {
        self.shard_dir(hash, kind).join(format!("{}.json", hash))
    }

    fn record_lock(&self, hash: &ContentHash) -> &Mutex<()> {
        let (prefix, _) = hash.shard();
        let stripe = usize::from_str_radix(prefix, 16).unwrap_or(0) % self.record_locks.len();
        &self.record_locks[stripe]
    }

    fn temp_path(dir: &Path, hash: &ContentHash) -> PathBuf {
        dir.join(format!(".{}.{}.tmp", hash, Uuid::new_v4()))
    }

    async fn read_record(&self, path: &Path) -> ReliquaryResult<Option<ContentRecord>> {
        match tokio::fs::read(path).await {
            Ok(raw) => {
                let record = serde_json::from_slice(&raw).map_err(|e| {
                    StorageError::new(StorageErrorKind::CorruptRecord(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                })?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
            .into()),
        }
    }

    /// Write `data` to a fresh temp file in `dir`, returning its path.
    async fn write_temp(dir: &Path, hash: &ContentHash, data: &[u8]) -> ReliquaryResult<PathBuf> {
        let temp_path = Self::temp_path(dir, hash);
        tokio::fs::write(&temp_path, data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;
        Ok(temp_path)
    }

    /// Re-read the record under its lock and apply `edit`, rewriting the
    /// sidecar when `edit` reports a change.
    ///
    /// Returns `None` if no record is stored.
    async fn update_record(
        &self,
        path: &Path,
        hash: &ContentHash,
        edit: impl FnOnce(&mut ContentRecord) -> bool,
    ) -> ReliquaryResult<Option<ContentRecord>> {
        let _guard = self.record_lock(hash).lock().await;
        let Some(mut record) = self.read_record(path).await? else {
            return Ok(None);
        };
        if edit(&mut record) {
            self.replace_record(path, &record).await?;
        }
        Ok(Some(record))
    }

    async fn replace_record(&self, path: &Path, record: &ContentRecord) -> ReliquaryResult<()> {
        let dir = path.parent().unwrap_or(&self.base_path);
        let encoded = encode_record(record)?;
        let temp_path = Self::write_temp(dir, &record.content_hash, &encoded).await?;
        tokio::fs::rename(&temp_path, path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;
        Ok(())
    }

    /// Refresh the requester on an existing record; a failure here is logged
    /// and the record returned as found.
    async fn touch(&self, path: &Path, record: ContentRecord, metadata: &PutMetadata) -> ContentRecord {
        let Some(requester) = metadata.requester_id() else {
            return record;
        };
        if record.last_requester_id.as_ref() == Some(requester) {
            return record;
        }
        let refreshed = self
            .update_record(path, &record.content_hash, |current| {
                if current.last_requester_id.as_ref() == Some(requester) {
                    return false;
                }
                current.last_requester_id = Some(requester.clone());
                true
            })
            .await;
        match refreshed {
            Ok(Some(updated)) => updated,
            Ok(None) => record,
            Err(e) => {
                tracing::warn!(hash = %record.content_hash, error = %e, "Failed to refresh requester on content record");
                record
            }
        }
    }
}

fn encode_record(record: &ContentRecord) -> ReliquaryResult<Vec<u8>> {
    serde_json::to_vec_pretty(record).map_err(|e| {
        StorageError::new(StorageErrorKind::CorruptRecord(format!(
            "encode {}: {}",
            record.content_hash, e
        )))
        .into()
    })
}

#[async_trait::async_trait]
impl ContentStore for FileSystemContentStore {
    #[tracing::instrument(skip(self), fields(hash = %hash.short()))]
    async fn exists(
        &self,
        hash: &ContentHash,
        kind: MediaKind,
    ) -> ReliquaryResult<Option<ContentRecord>> {
        self.read_record(&self.record_path(hash, kind)).await
    }

    #[tracing::instrument(skip(self, bytes, metadata), fields(hash = %hash.short(), size = bytes.len(), kind = %kind))]
    async fn put(
        &self,
        hash: &ContentHash,
        kind: MediaKind,
        extension: &str,
        bytes: &Bytes,
        metadata: &PutMetadata,
    ) -> ReliquaryResult<StoredContent> {
        verify_hash(bytes, hash)?;

        let record_path = self.record_path(hash, kind);

        // If record already exists, just return it (deduplication)
        if let Some(existing) = self.read_record(&record_path).await? {
            tracing::debug!(path = %existing.stored_location, "Content already stored");
            let record = self.touch(&record_path, existing, metadata).await;
            return Ok(StoredContent {
                record,
                newly_stored: false,
            });
        }

        let dir = self.shard_dir(hash, kind);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                dir.display(),
                e
            )))
        })?;

        // Artifact first: identical bytes, so a racing rename is harmless.
        let artifact_path = self.artifact_path(hash, kind, extension);
        let temp_path = Self::write_temp(&dir, hash, bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &artifact_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                artifact_path.display(),
                e
            )))
            .into());
        }

        let record = ContentRecord {
            content_hash: hash.clone(),
            kind,
            extension: extension.to_string(),
            stored_location: artifact_path.to_string_lossy().to_string(),
            public_location: None,
            size_bytes: bytes.len() as u64,
            created_at: Utc::now(),
            last_requester_id: metadata.requester_id().clone(),
        };

        // Publish the record with create-if-absent semantics.
        let temp_record = Self::write_temp(&dir, hash, &encode_record(&record)?).await?;
        let linked = tokio::fs::hard_link(&temp_record, &record_path).await;
        let _ = tokio::fs::remove_file(&temp_record).await;

        match linked {
            Ok(()) => {
                tracing::info!(
                    path = %artifact_path.display(),
                    size = bytes.len(),
                    kind = %kind,
                    "Stored content"
                );
                Ok(StoredContent {
                    record,
                    newly_stored: true,
                })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // A concurrent writer published first; theirs is the record.
                let existing = self.read_record(&record_path).await?.ok_or_else(|| {
                    StorageError::new(StorageErrorKind::NotFound(
                        record_path.display().to_string(),
                    ))
                })?;
                tracing::debug!("Lost record publish race, using first writer's record");
                let record = self.touch(&record_path, existing, metadata).await;
                Ok(StoredContent {
                    record,
                    newly_stored: false,
                })
            }
            Err(e) => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "link {}: {}",
                record_path.display(),
                e
            )))
            .into()),
        }
    }

    #[tracing::instrument(skip(self, record), fields(hash = %record.content_hash.short(), path = %record.stored_location))]
    async fn retrieve(&self, record: &ContentRecord) -> ReliquaryResult<Bytes> {
        let path = Path::new(&record.stored_location);

        let data = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(record.stored_location.clone()))
            } else {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        })?;

        verify_hash(&data, &record.content_hash)?;

        tracing::debug!(size = data.len(), "Retrieved content");
        Ok(Bytes::from(data))
    }

    #[tracing::instrument(skip(self), fields(hash = %hash.short()))]
    async fn refresh_location(
        &self,
        hash: &ContentHash,
        kind: MediaKind,
        public_location: &str,
    ) -> ReliquaryResult<ContentRecord> {
        let path = self.record_path(hash, kind);
        let record = self
            .update_record(&path, hash, |current| {
                if current.public_location.as_deref() == Some(public_location) {
                    return false;
                }
                current.public_location = Some(public_location.to_string());
                true
            })
            .await?
            .ok_or_else(|| {
                StorageError::new(StorageErrorKind::NotFound(path.display().to_string()))
            })?;

        tracing::debug!(location = public_location, "Refreshed public location");
        Ok(record)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
