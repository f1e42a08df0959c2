//! Cancellation capability

use std::sync::atomic::{AtomicBool, Ordering};

/// Capability implemented by events that can be cancelled
///
/// Cancellation is cooperative: a cancelled event still reaches subscribers
/// registered with `invoked_for_cancelled`, and any of them may un-cancel it.
pub trait Cancellable: Send + Sync {
    /// Whether the event is currently cancelled
    fn is_cancelled(&self) -> bool;

    /// Set the cancelled flag
    fn set_cancelled(&self, cancelled: bool);

    /// Shorthand for `set_cancelled(true)`
    fn cancel(&self) {
        self.set_cancelled(true);
    }
}

/// Shared cancellation cell
///
/// Events embed one of these and hand it out from `Event::cancellable`.
/// The host bus and the event managers read and write the same cell,
/// so both systems always agree on the cancelled state.
#[derive(Debug, Default)]
pub struct CancelState {
    cancelled: AtomicBool,
}

impl CancelState {
    /// Create a new, not-cancelled cell
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Create a cell with an initial state
    pub const fn with_state(cancelled: bool) -> Self {
        Self {
            cancelled: AtomicBool::new(cancelled),
        }
    }
}

impl Cancellable for CancelState {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn set_cancelled(&self, cancelled: bool) {
        self.cancelled.store(cancelled, Ordering::Release);
    }
}

/// Events can share one cell between several values
impl<T: Cancellable + ?Sized> Cancellable for std::sync::Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }

    fn set_cancelled(&self, cancelled: bool) {
        (**self).set_cancelled(cancelled);
    }
}
