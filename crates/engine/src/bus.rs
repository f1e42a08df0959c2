//! Host event bus interface

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use canopy_sdk::{Event, Priority, SharedEvent};

use crate::error::HostError;

/// Callback the host bus invokes for each matching native event
pub type HostExecutor = Arc<dyn Fn(&SharedEvent) + Send + Sync>;

/// Identifies one native event type on the host bus
///
/// Two kinds are equal when they name the same Rust type.
#[derive(Debug, Clone, Copy)]
pub struct HostEventKind {
    type_id: TypeId,
    name: &'static str,
}

impl HostEventKind {
    /// Kind for the event type `E`
    pub fn of<E: Event>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// Kind of an already-constructed event
    pub fn of_event(event: &dyn Event) -> Self {
        Self {
            type_id: event.event_type_id(),
            name: event.name(),
        }
    }

    /// Concrete Rust type of the event
    pub fn event_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Type name, for logging
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for HostEventKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for HostEventKind {}

impl std::hash::Hash for HostEventKind {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for HostEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Handle a listener uses to register on, and later leave, the host bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostListenerId(u64);

impl HostListenerId {
    /// Wrap a raw ID issued by a bus
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// The host's native event bus
///
/// Implemented by the host integration layer. Executors are invoked
/// synchronously on the host's main thread while the event is fired.
pub trait HostEventBus: Send + Sync {
    /// Issue a listener ID unique on this bus
    fn allocate_listener(&self) -> HostListenerId;

    /// Register `executor` for every native event of `kind`
    fn register_event(
        &self,
        listener: HostListenerId,
        kind: HostEventKind,
        priority: Priority,
        executor: HostExecutor,
    ) -> Result<(), HostError>;

    /// Remove every registration made by `listener`
    fn unregister_all(&self, listener: HostListenerId);

    /// Fire an event on the native bus
    ///
    /// The host reads and writes cancellation through the event's own
    /// cancel cell, the same one canopy subscribers see.
    fn call_event(&self, event: &SharedEvent) -> Result<(), HostError>;
}
