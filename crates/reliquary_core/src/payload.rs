//! Fetched payloads.

use crate::{LedgerRecord, MediaKind};
use bytes::Bytes;

/// One media file handed back by a fetch collaborator.
///
/// `Bytes` keeps clones cheap: the same payload is handed to every waiter of
/// a coalesced request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    /// Raw bytes
    pub bytes: Bytes,
    /// Kind of media
    pub kind: MediaKind,
    /// File extension without the dot
    pub extension: String,
}

impl MediaPayload {
    /// Create a payload.
    pub fn new(bytes: impl Into<Bytes>, kind: MediaKind, extension: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            kind,
            extension: extension.into(),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Successful answer from a fetch collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Fresh bytes, in the source's own order (one or more items)
    Fetched(Vec<MediaPayload>),
    /// The collaborator knows this exact request was already delivered.
    ///
    /// This is a terminal cache hit, not an in-flight collision.
    AlreadyDelivered(LedgerRecord),
}
