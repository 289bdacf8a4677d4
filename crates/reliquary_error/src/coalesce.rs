//! Errors raised by the single-flight layer itself.

use std::time::Duration;

/// Kinds of coalescing failures.
///
/// These never come from the shared operation; they describe what happened
/// to one waiter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CoalesceErrorKind {
    /// This caller's wait exceeded its own timeout
    #[display("Timed out after {}ms waiting for shared fetch", _0.as_millis())]
    TimedOut(Duration),
    /// The shared operation ended without producing a result
    #[display("Shared fetch abandoned: {}", _0)]
    Abandoned(String),
    /// The shared operation panicked
    #[display("Shared fetch panicked")]
    Panicked,
}

/// Coalescing error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Coalesce Error: {} at line {} in {}", kind, line, file)]
pub struct CoalesceError {
    /// The kind of error that occurred
    pub kind: CoalesceErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CoalesceError {
    /// Create a new coalescing error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CoalesceErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
