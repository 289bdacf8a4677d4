//! Delivery error types.

/// Kinds of delivery failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum DeliveryErrorKind {
    /// A channel refused or failed a send
    #[display("{} channel send failed: {}", channel, detail)]
    SendFailed {
        /// Channel that failed (`limited` or `unlimited`)
        channel: String,
        /// What the channel reported
        detail: String,
    },
    /// The payload does not fit the channel's size budget
    #[display("Payload of {} bytes exceeds {} byte budget", size, budget)]
    OverBudget {
        /// Payload size
        size: u64,
        /// Channel budget
        budget: u64,
    },
    /// The channel replied without a usable location
    #[display("Channel returned no location: {}", _0)]
    MissingLocation(String),
    /// Every attempt in the cascade failed
    #[display("All delivery attempts failed: {}", _0)]
    Exhausted(String),
    /// Some items of a batch could not be delivered
    #[display("Delivered {} of {} items: {}", delivered, total, detail)]
    Incomplete {
        /// Items that reached a channel
        delivered: usize,
        /// Items in the batch
        total: usize,
        /// Failure detail for the undelivered items
        detail: String,
    },
}

/// Delivery error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Delivery Error: {} at line {} in {}", kind, line, file)]
pub struct DeliveryError {
    /// The kind of error that occurred
    pub kind: DeliveryErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl DeliveryError {
    /// Create a new delivery error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: DeliveryErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a failed send on the named channel.
    #[track_caller]
    pub fn send_failed(channel: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::SendFailed {
            channel: channel.into(),
            detail: detail.into(),
        })
    }
}
