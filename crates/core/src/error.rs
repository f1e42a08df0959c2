//! Error types for the event core

use canopy_engine::HostError;

/// Boxed error returned by fallible subscribers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced to callers of the event managers
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The manager was disposed and can no longer be used
    #[error("Event manager for '{owner}' is disposed")]
    Disposed { owner: String },

    /// The same listener object was registered twice on one manager
    #[error("Listener {listener} is already registered on the event manager for '{owner}'")]
    DuplicateListener {
        listener: &'static str,
        owner: String,
    },

    /// The owner was disabled and can no longer register anything
    #[error("Owner '{0}' is not active")]
    InactiveOwner(String),

    /// A host operation was requested but no host is attached
    #[error("No host is attached to the event runtime")]
    HostUnavailable,

    /// The host bus rejected the operation
    #[error("Host bus error: {0}")]
    Host(#[from] HostError),
}

/// Result type for event manager operations
pub type EventResult<T> = Result<T, EventError>;

/// Failure of a single subscriber invocation
///
/// These never reach the producer of the event; the dispatch agent logs
/// them and moves on to the next subscriber.
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    /// The subscriber returned an error
    #[error("subscriber returned an error: {0}")]
    Failed(#[source] BoxError),

    /// The subscriber panicked
    #[error("subscriber panicked: {0}")]
    Panicked(String),
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
