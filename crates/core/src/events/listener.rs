//! Listener objects
//!
//! A listener groups several subscribers on one object. Implement
//! [`Listener`] by hand, or let `#[event_listener]` generate it from
//! `#[subscribe]` methods:
//!
//! ```
//! use canopy_core::events::{Listener, ListenerRegistrar, Priority, SubscribeOptions};
//! use canopy_core::Event;
//!
//! #[derive(Event)]
//! struct Ping;
//!
//! struct Greeter;
//!
//! impl Listener for Greeter {
//!     fn subscribe(registrar: &mut ListenerRegistrar<Self>) {
//!         registrar.on(
//!             SubscribeOptions::with_priority(Priority::High),
//!             |_: &Greeter, _: &Ping| println!("pong"),
//!         );
//!     }
//! }
//! ```

use std::sync::Arc;

use canopy_sdk::Event;

use super::subscriber::{PendingSubscriber, SubscribeOptions};
use crate::error::BoxError;

/// Identity of a registered listener object (its allocation address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ListenerId(usize);

impl ListenerId {
    pub fn of<L>(listener: &Arc<L>) -> Self {
        Self(Arc::as_ptr(listener) as *const () as usize)
    }
}

/// An object whose methods subscribe to events
pub trait Listener: Send + Sync + Sized + 'static {
    /// Declare this listener's subscriptions
    fn subscribe(registrar: &mut ListenerRegistrar<Self>);
}

/// Collects the subscriptions a [`Listener`] declares
pub struct ListenerRegistrar<L> {
    listener: Arc<L>,
    pending: Vec<PendingSubscriber>,
}

impl<L: Listener> ListenerRegistrar<L> {
    pub(crate) fn new(listener: Arc<L>) -> Self {
        Self {
            listener,
            pending: Vec::new(),
        }
    }

    /// The listener being registered
    pub fn listener(&self) -> &Arc<L> {
        &self.listener
    }

    /// Subscribe `method` to events of type `E`
    pub fn on<E, F>(&mut self, options: SubscribeOptions, method: F) -> &mut Self
    where
        E: Event,
        F: Fn(&L, &E) + Send + Sync + 'static,
    {
        let listener = self.listener.clone();
        self.pending.push(PendingSubscriber::typed::<E, _>(options, move |event| {
            method(&listener, event);
            Ok(())
        }));
        self
    }

    /// Subscribe a fallible `method`; errors are logged by the dispatcher
    pub fn try_on<E, F, Err>(&mut self, options: SubscribeOptions, method: F) -> &mut Self
    where
        E: Event,
        F: Fn(&L, &E) -> Result<(), Err> + Send + Sync + 'static,
        Err: Into<BoxError>,
    {
        let listener = self.listener.clone();
        self.pending.push(PendingSubscriber::typed::<E, _>(options, move |event| {
            method(&listener, event).map_err(Into::into)
        }));
        self
    }

    /// Number of subscriptions declared so far
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn into_pending(self) -> Vec<PendingSubscriber> {
        self.pending
    }
}
