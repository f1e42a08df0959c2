//! Event trait and shared event handles

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::cancel::Cancellable;
use crate::category::EventCategory;

/// A dispatched event, shared by reference.
///
/// Managers identify an event occurrence by the address of its `Arc`
/// allocation, so the same event value re-published through several
/// forwarding paths is recognised as one occurrence.
pub type SharedEvent = Arc<dyn Event>;

/// Upcast helper so type-erased events can be downcast by subscribers
pub trait AsAny {
    /// View this event as `Any` for downcasting
    fn as_any(&self) -> &dyn Any;
}

impl<T: Event> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Trait that all events must implement
///
/// Fields a subscriber is allowed to change must use interior mutability,
/// since every subscriber receives a shared reference.
///
/// # Example
///
/// ```
/// use canopy_sdk::{CancelState, Cancellable, Event, EventCategory};
///
/// struct PlayerChat {
///     message: String,
///     cancel: CancelState,
/// }
///
/// impl Event for PlayerChat {
///     fn cancellable(&self) -> Option<&dyn Cancellable> {
///         Some(&self.cancel)
///     }
///
///     fn category(&self) -> EventCategory {
///         EventCategory::Player
///     }
/// }
/// ```
pub trait Event: AsAny + Send + Sync + 'static {
    /// Display name used in logs (defaults to the Rust type name)
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Concrete type of this event, used to pick a dispatch agent
    fn event_type_id(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    /// Cancellation capability, if this event supports it
    fn cancellable(&self) -> Option<&dyn Cancellable> {
        None
    }

    /// Host category this event belongs to
    fn category(&self) -> EventCategory {
        EventCategory::Other
    }
}

impl dyn Event {
    /// Returns `true` if the event is cancellable and currently cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancellable().map(|c| c.is_cancelled()).unwrap_or(false)
    }

    /// Check whether this event is of concrete type `T`
    pub fn is<T: Event>(&self) -> bool {
        self.event_type_id() == TypeId::of::<T>()
    }

    /// Downcast to a concrete event type
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for dyn Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name())
            .field("category", &self.category())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
