//! Persistent records: stored content and delivered requests.

use crate::{ContentHash, DeliveredLocation, MediaKind, RequestKey};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// One stored artifact, keyed by its content hash.
///
/// Created on the first successful store of a hash. Afterwards only
/// `last_requester_id` and `public_location` change; records are never
/// deleted by this workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// SHA-256 of the stored bytes
    pub content_hash: ContentHash,
    /// Kind of media
    pub kind: MediaKind,
    /// File extension without the dot
    pub extension: String,
    /// Backend-specific location of the stored bytes
    pub stored_location: String,
    /// Durable public location, once the bytes have been uploaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_location: Option<String>,
    /// Size in bytes
    pub size_bytes: u64,
    /// When the artifact was first stored
    pub created_at: DateTime<Utc>,
    /// Most recent requester that converged on this content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_requester_id: Option<String>,
}

/// Caller-supplied context for a content store write.
///
/// Two writes of the same bytes with different metadata still produce one
/// artifact; the metadata only refreshes `last_requester_id`.
///
/// # Example
///
/// ```
/// use reliquary_core::PutMetadataBuilder;
///
/// let metadata = PutMetadataBuilder::default()
///     .requester_id("user-42")
///     .source("https://example.com/clip.mp4")
///     .build()
///     .unwrap();
/// assert_eq!(metadata.requester_id().as_deref(), Some("user-42"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, derive_builder::Builder)]
#[builder(setter(into, strip_option), default)]
pub struct PutMetadata {
    /// Requester on whose behalf the bytes are stored
    requester_id: Option<String>,
    /// Source reference the bytes came from
    source: Option<String>,
}

impl PutMetadata {
    /// Metadata naming only the requester.
    pub fn for_requester(requester_id: impl Into<String>) -> Self {
        Self {
            requester_id: Some(requester_id.into()),
            source: None,
        }
    }
}

/// Durable answer for a request key that has been fully delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Request identity
    pub key: RequestKey,
    /// Delivered items, in source order
    pub items: Vec<DeliveredLocation>,
    /// Requester whose request produced the delivery
    pub requester_id: String,
    /// When the record was written
    pub recorded_at: DateTime<Utc>,
}

impl LedgerRecord {
    /// Record for `key`, stamped now.
    pub fn new(key: RequestKey, items: Vec<DeliveredLocation>, requester_id: impl Into<String>) -> Self {
        Self {
            key,
            items,
            requester_id: requester_id.into(),
            recorded_at: Utc::now(),
        }
    }

    /// Total delivered bytes.
    pub fn size_bytes(&self) -> u64 {
        self.items.iter().map(|i| i.size_bytes).sum()
    }
}
