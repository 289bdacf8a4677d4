//! Content identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 digest of a byte sequence, lower-case hex.
///
/// Two different byte sequences are never assumed equal; equality of hashes
/// is the only dedup test used anywhere.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("{}", _0)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Parse a hex digest produced by [`ContentHasher`].
    ///
    /// Returns `None` unless the input is exactly 64 lower-case hex digits.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let valid = hex.len() == 64
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex.to_string()))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-level shard prefix used by content-addressed layouts.
    pub fn shard(&self) -> (&str, &str) {
        (&self.0[0..2], &self.0[2..4])
    }

    /// Short form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl TryFrom<String> for ContentHash {
    type Error = String;

    fn try_from(hex: String) -> Result<Self, Self::Error> {
        Self::from_hex(&hex).ok_or_else(|| format!("invalid content hash: {:?}", hex))
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

/// Computes content identity.
///
/// Callers must re-hash after any step that changes bytes; a hash is never
/// carried across a transform.
///
/// # Example
///
/// ```
/// use reliquary_core::ContentHasher;
///
/// let a = ContentHasher::hash(b"clip");
/// let b = ContentHasher::hash(b"clip");
/// assert_eq!(a, b);
/// assert_ne!(a, ContentHasher::hash(b"clip2"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl ContentHasher {
    /// Compute the SHA-256 content hash of `data`.
    pub fn hash(data: &[u8]) -> ContentHash {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(format!("{:x}", hasher.finalize()))
    }
}
