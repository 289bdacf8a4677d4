//! Content-addressable media storage for Reliquary.
//!
//! This crate provides the content store (hash to stored artifact) and the
//! request ledger implementations (request key to delivered locations).
//!
//! # Features
//!
//! - **Content-addressable storage**: Files stored by SHA-256 hash for automatic deduplication
//! - **First writer wins**: Concurrent writes of the same bytes produce one artifact
//! - **Atomic operations**: Temp file + rename/link so readers never see partial data
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use reliquary_core::{ContentHasher, MediaKind, PutMetadata};
//! use reliquary_storage::{ContentStore, FileSystemContentStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileSystemContentStore::new("/tmp/reliquary-media")?;
//! let bytes = Bytes::from_static(b"GIF89a...");
//! let hash = ContentHasher::hash(&bytes);
//!
//! let first = store
//!     .put(&hash, MediaKind::Gif, "gif", &bytes, &PutMetadata::for_requester("a"))
//!     .await?;
//! let second = store
//!     .put(&hash, MediaKind::Gif, "gif", &bytes, &PutMetadata::for_requester("b"))
//!     .await?;
//! assert_eq!(first.record.stored_location, second.record.stored_location);
//! assert!(!second.newly_stored);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod filesystem;
mod ledger;
mod memory;
mod store;

pub use filesystem::FileSystemContentStore;
pub use ledger::{JsonFileLedger, MemoryLedger};
pub use memory::MemoryContentStore;
pub use reliquary_error::{StorageError, StorageErrorKind};
pub use store::{ContentStore, StoredContent, verify_hash};
