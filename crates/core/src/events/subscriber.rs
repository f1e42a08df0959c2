//! Subscribers - one callback bound to one event type

use std::any::TypeId;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use slotmap::new_key_type;

use canopy_sdk::{Event, Priority};

use super::listener::ListenerId;
use super::owner::Owner;
use crate::error::{panic_message, BoxError, SubscriberError};

new_key_type! {
    /// Key for subscribers registered on an event manager
    pub struct SubscriberKey;
}

/// Type-erased subscriber callback
pub(crate) type ErasedCallback =
    Box<dyn Fn(&dyn Event) -> Result<(), SubscriberError> + Send + Sync + 'static>;

/// Ordering and cancellation behavior of a subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Position in the dispatch order
    pub priority: Priority,
    /// Whether to run even when the event is already cancelled
    pub invoked_for_cancelled: bool,
}

impl SubscribeOptions {
    pub const fn new(priority: Priority, invoked_for_cancelled: bool) -> Self {
        Self {
            priority,
            invoked_for_cancelled,
        }
    }

    /// Options with the given priority, skipping cancelled events
    pub const fn with_priority(priority: Priority) -> Self {
        Self::new(priority, false)
    }
}

/// Everything needed to build a subscriber, minus its key and owner
pub(crate) struct PendingSubscriber {
    pub event_type: TypeId,
    pub event_name: &'static str,
    pub options: SubscribeOptions,
    pub callback: ErasedCallback,
}

impl PendingSubscriber {
    /// Wrap a typed callback for event type `E`
    pub fn typed<E, F>(options: SubscribeOptions, callback: F) -> Self
    where
        E: Event,
        F: Fn(&E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            event_type: TypeId::of::<E>(),
            event_name: std::any::type_name::<E>(),
            options,
            callback: Box::new(move |event: &dyn Event| match event.downcast_ref::<E>() {
                Some(event) => callback(event).map_err(SubscriberError::Failed),
                // Agents are keyed by concrete type, so this only happens
                // when an event overrides `event_type_id`
                None => Ok(()),
            }),
        }
    }
}

/// A registered callback for one event type
pub struct Subscriber {
    key: SubscriberKey,
    event_type: TypeId,
    event_name: &'static str,
    options: SubscribeOptions,
    owner: Owner,
    listener: Option<ListenerId>,
    disposed: AtomicBool,
    callback: ErasedCallback,
}

impl Subscriber {
    pub(crate) fn new(
        key: SubscriberKey,
        owner: Owner,
        listener: Option<ListenerId>,
        pending: PendingSubscriber,
    ) -> Self {
        Self {
            key,
            event_type: pending.event_type,
            event_name: pending.event_name,
            options: pending.options,
            owner,
            listener,
            disposed: AtomicBool::new(false),
            callback: pending.callback,
        }
    }

    pub fn key(&self) -> SubscriberKey {
        self.key
    }

    pub fn event_type(&self) -> TypeId {
        self.event_type
    }

    pub fn event_name(&self) -> &'static str {
        self.event_name
    }

    pub fn priority(&self) -> Priority {
        self.options.priority
    }

    pub fn invoked_for_cancelled(&self) -> bool {
        self.options.invoked_for_cancelled
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub(crate) fn listener(&self) -> Option<ListenerId> {
        self.listener
    }

    /// Whether the subscriber was removed from its manager
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    /// Run the callback, catching panics
    pub(crate) fn invoke(&self, event: &dyn Event) -> Result<(), SubscriberError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(event))) {
            Ok(result) => result,
            Err(payload) => Err(SubscriberError::Panicked(panic_message(payload))),
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("event", &self.event_name)
            .field("priority", &self.options.priority)
            .field("invoked_for_cancelled", &self.options.invoked_for_cancelled)
            .field("owner", &self.owner.name())
            .finish_non_exhaustive()
    }
}
