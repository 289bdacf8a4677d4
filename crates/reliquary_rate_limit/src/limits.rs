//! Per-source request limits.

use serde::{Deserialize, Serialize};

/// Limits applied to requests against one upstream source.
///
/// `None` means unlimited for that dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLimits {
    /// Requests per minute
    #[serde(default)]
    pub rpm: Option<u32>,
    /// Maximum requests in flight at once
    #[serde(default)]
    pub max_concurrent: Option<u32>,
}

impl SourceLimits {
    /// Limits with neither bound set.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Whether any bound is set.
    pub fn is_limited(&self) -> bool {
        self.rpm.is_some_and(|n| n > 0) || self.max_concurrent.is_some_and(|n| n > 0)
    }
}
