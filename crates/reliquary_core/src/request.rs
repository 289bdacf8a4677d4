//! Request identity and trim parameters.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Clip window applied to fetched media.
///
/// Offsets are kept in whole milliseconds so that equal windows compare and
/// hash equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TrimSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
}

impl TrimSpec {
    /// Window starting at `start` and running `duration` (or to the end).
    pub fn new(start: Option<Duration>, duration: Option<Duration>) -> Self {
        Self {
            start_ms: start.map(|d| d.as_millis() as u64),
            duration_ms: duration.map(|d| d.as_millis() as u64),
        }
    }

    /// Window starting at `start` and running to the end.
    pub fn starting_at(start: Duration) -> Self {
        Self::new(Some(start), None)
    }

    /// Start offset, if any.
    pub fn start(&self) -> Option<Duration> {
        self.start_ms.map(Duration::from_millis)
    }

    /// Clip length, if any.
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    /// A window with neither bound changes nothing.
    pub fn is_noop(&self) -> bool {
        self.start_ms.is_none() && self.duration_ms.is_none()
    }

    /// Parameters in key order. Order is part of the request key format.
    fn params(&self) -> [(&'static str, Option<u64>); 2] {
        [("start", self.start_ms), ("duration", self.duration_ms)]
    }
}

/// Deterministic identity of a logical fetch+transform request.
///
/// Derived from the trimmed source reference and the trim parameters in a
/// fixed order. An absent parameter is written as a sentinel, so `start`
/// missing and `start = 0` produce different keys. A trim spec with no
/// bounds is the same logical request as no trim spec at all.
///
/// # Example
///
/// ```
/// use reliquary_core::{RequestKey, TrimSpec};
/// use std::time::Duration;
///
/// let plain = RequestKey::derive("https://example.com/v.mp4", None);
/// let zero = RequestKey::derive(
///     "https://example.com/v.mp4",
///     Some(&TrimSpec::starting_at(Duration::ZERO)),
/// );
/// assert_ne!(plain, zero);
/// assert_eq!(plain, RequestKey::derive(" https://example.com/v.mp4 ", None));
/// ```
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
#[serde(transparent)]
pub struct RequestKey(String);

/// Written in place of a parameter that was not supplied.
const ABSENT: &str = "~";

impl RequestKey {
    /// Derive the key for `source` with optional trim parameters.
    pub fn derive(source: &str, trim: Option<&TrimSpec>) -> Self {
        let source = source.trim();
        let mut hasher = Sha256::new();
        hasher.update(b"reliquary/request/v1\n");
        // Length prefix keeps the source from bleeding into the parameters.
        hasher.update(format!("source:{}:", source.len()).as_bytes());
        hasher.update(source.as_bytes());
        hasher.update(b"\n");

        let trim = trim.copied().unwrap_or_default();
        for (name, value) in trim.params() {
            let encoded = match value {
                Some(ms) => format!("{}={}\n", name, ms),
                None => format!("{}={}\n", name, ABSENT),
            };
            hasher.update(encoded.as_bytes());
        }

        Self(format!("{:x}", hasher.finalize()))
    }

    /// The hex form of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What the fetch collaborator is asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Source reference (usually a URL)
    pub source: String,
    /// Optional clip window
    pub trim: Option<TrimSpec>,
}

impl FetchRequest {
    /// Build a request, dropping a trim spec that bounds nothing.
    pub fn new(source: impl Into<String>, trim: Option<TrimSpec>) -> Self {
        Self {
            source: source.into().trim().to_string(),
            trim: trim.filter(|t| !t.is_noop()),
        }
    }

    /// The coalescing and ledger key for this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::derive(&self.source, self.trim.as_ref())
    }
}
