//! Lifecycle log error types.

/// Kinds of lifecycle log errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum LifecycleErrorKind {
    /// Transition not allowed by the request state machine
    #[display("Invalid transition for {}: {} -> {}", request_id, from, to)]
    InvalidTransition {
        /// Request being transitioned
        request_id: String,
        /// Current phase
        from: String,
        /// Requested phase
        to: String,
    },
    /// First record for a request must be `pending`
    #[display("Request {} has no pending record", _0)]
    UnknownRequest(String),
    /// The external sink rejected a record
    #[display("Lifecycle sink failed: {}", _0)]
    Sink(String),
}

/// Lifecycle error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Lifecycle Error: {} at line {} in {}", kind, line, file)]
pub struct LifecycleError {
    /// The kind of error that occurred
    pub kind: LifecycleErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl LifecycleError {
    /// Create a new lifecycle error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: LifecycleErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
