//! Transform error types.

/// Kinds of transform failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TransformErrorKind {
    /// The external tool could not be started
    #[display("Failed to launch transform tool: {}", _0)]
    Spawn(String),
    /// The external tool ran and reported failure
    #[display("Transform tool failed (status {}): {}", status, stderr)]
    ToolFailed {
        /// Exit status, if the process exited normally
        status: i32,
        /// Tail of the tool's stderr
        stderr: String,
    },
    /// Scratch file I/O around the tool failed
    #[display("Transform I/O error: {}", _0)]
    Io(String),
    /// The transform produced no output bytes
    #[display("Transform produced empty output")]
    EmptyOutput,
}

/// Transform error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Transform Error: {} at line {} in {}", kind, line, file)]
pub struct TransformError {
    /// The kind of error that occurred
    pub kind: TransformErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl TransformError {
    /// Create a new transform error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: TransformErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
