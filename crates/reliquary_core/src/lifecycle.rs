//! Request lifecycle phases and records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one caller's request.
pub type RequestId = Uuid;

/// Phase of a request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    /// Accepted, nothing started
    #[display("pending")]
    Pending,
    /// Fetch/transform/delivery under way
    #[display("running")]
    Running,
    /// Delivered and recorded (terminal)
    #[display("success")]
    Success,
    /// Failed without recovery (terminal)
    #[display("error")]
    Error,
}

impl LifecyclePhase {
    /// Terminal phases are immutable once written.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecyclePhase::Success | LifecyclePhase::Error)
    }

    /// Whether `self -> next` is an allowed transition.
    ///
    /// `pending -> success` is the ledger short-circuit.
    pub fn can_transition_to(&self, next: LifecyclePhase) -> bool {
        use LifecyclePhase::*;
        matches!(
            (self, next),
            (Pending, Running) | (Pending, Success) | (Running, Success) | (Running, Error)
        )
    }
}

/// One entry in the append-only lifecycle log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    /// Request the entry belongs to
    pub request_id: RequestId,
    /// Phase entered
    pub phase: LifecyclePhase,
    /// Delivered bytes, on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Human-readable failure reason, on error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// When the phase was entered
    pub at: DateTime<Utc>,
}

impl LifecycleRecord {
    /// Entry for `phase` with no detail, stamped now.
    pub fn new(request_id: RequestId, phase: LifecyclePhase) -> Self {
        Self {
            request_id,
            phase,
            size_bytes: None,
            error_detail: None,
            at: Utc::now(),
        }
    }

    /// Success entry carrying the delivered size.
    pub fn success(request_id: RequestId, size_bytes: u64) -> Self {
        Self {
            size_bytes: Some(size_bytes),
            ..Self::new(request_id, LifecyclePhase::Success)
        }
    }

    /// Error entry carrying the failure reason.
    pub fn error(request_id: RequestId, detail: impl Into<String>) -> Self {
        Self {
            error_detail: Some(detail.into()),
            ..Self::new(request_id, LifecyclePhase::Error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecyclePhase::*;

    #[test]
    fn test_terminal_phases_have_no_exits() {
        for next in [Pending, Running, Success, Error] {
            assert!(!Success.can_transition_to(next));
            assert!(!Error.can_transition_to(next));
        }
    }

    #[test]
    fn test_short_circuit_allowed() {
        assert!(Pending.can_transition_to(Success));
        assert!(!Pending.can_transition_to(Error));
        assert!(!Running.can_transition_to(Pending));
    }
}
