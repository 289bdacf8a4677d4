//! Delivery channel identity and delivered locations.

use crate::{ContentHash, MediaKind};
use serde::{Deserialize, Serialize};

/// Which delivery channel carried a payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Size-budgeted channel (inline chat attachment)
    #[display("limited")]
    Limited,
    /// Effectively uncapped channel (object storage)
    #[display("unlimited")]
    Unlimited,
}

impl ChannelKind {
    /// Whether locations on this channel stay valid and can be reused.
    pub fn is_durable(&self) -> bool {
        matches!(self, ChannelKind::Unlimited)
    }
}

/// Where one payload ended up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveredLocation {
    /// Public location (URL)
    pub location: String,
    /// Channel that accepted the payload
    pub channel: ChannelKind,
    /// Identity of the delivered bytes
    pub content_hash: ContentHash,
    /// Kind of media
    pub kind: MediaKind,
    /// File extension without the dot
    pub extension: String,
    /// Size in bytes
    pub size_bytes: u64,
}
