//! Error types for host bus operations

/// Error type for host bus operations
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host does not know this native event type
    #[error("Unknown host event kind: {0}")]
    UnknownEventKind(String),

    /// The listener is not registered with the host bus
    #[error("Unknown host listener: {0}")]
    UnknownListener(u64),

    /// The host refused to fire or register the event
    #[error("Host rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
}
