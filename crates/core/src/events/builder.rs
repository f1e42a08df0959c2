//! Fluent subscription builder

use std::marker::PhantomData;

use canopy_sdk::{Event, Priority};

use super::manager::{EventManager, Subscription};
use super::owner::Owner;
use super::subscriber::SubscribeOptions;
use crate::error::{BoxError, EventResult};

/// Builder returned by [`EventManager::subscribe`]
///
/// ```ignore
/// manager
///     .subscribe::<PlayerChat>(&owner)
///     .priority(Priority::High)
///     .invoked_for_cancelled(true)
///     .handler(|chat| println!("{}", chat.message))?;
/// ```
#[must_use = "a subscription is only registered by calling handler or try_handler"]
pub struct SubscriberBuilder<'m, E> {
    manager: &'m EventManager,
    owner: Owner,
    options: SubscribeOptions,
    _event: PhantomData<fn(&E)>,
}

impl<'m, E: Event> SubscriberBuilder<'m, E> {
    pub(crate) fn new(manager: &'m EventManager, owner: Owner) -> Self {
        Self {
            manager,
            owner,
            options: SubscribeOptions::default(),
            _event: PhantomData,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.options.priority = priority;
        self
    }

    pub fn invoked_for_cancelled(mut self, invoked: bool) -> Self {
        self.options.invoked_for_cancelled = invoked;
        self
    }

    /// Register an infallible handler
    pub fn handler<F>(self, handler: F) -> EventResult<Subscription>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.manager
            .register::<E, _>(&self.owner, self.options, handler)
    }

    /// Register a fallible handler
    pub fn try_handler<F, Err>(self, handler: F) -> EventResult<Subscription>
    where
        F: Fn(&E) -> Result<(), Err> + Send + Sync + 'static,
        Err: Into<BoxError>,
    {
        self.manager
            .try_register::<E, _, _>(&self.owner, self.options, handler)
    }
}
