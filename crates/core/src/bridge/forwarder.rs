//! Inbound forwarding from the host bus

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use canopy_engine::{HostEventBus, HostEventKind, HostExecutor, HostListenerId};
use canopy_sdk::{Event, Priority, SharedEvent};

use super::category::{route, CategoryHooks};
use crate::error::{panic_message, EventError, EventResult};
use crate::events::EventManager;
use crate::runtime::EventRuntime;

/// Republishes native host events into an event manager
///
/// Each host event kind is registered at most once; every occurrence is
/// routed through the category hooks and then called on the target
/// manager with the target's owner as source.
pub struct HostForwarder {
    listener: HostListenerId,
    bus: Arc<dyn HostEventBus>,
    target: EventManager,
    hooks: Arc<dyn CategoryHooks>,
    priority: Priority,
    kinds: Mutex<HashSet<HostEventKind>>,
}

impl HostForwarder {
    pub fn new(
        bus: Arc<dyn HostEventBus>,
        target: EventManager,
        hooks: Arc<dyn CategoryHooks>,
    ) -> Self {
        Self {
            listener: bus.allocate_listener(),
            bus,
            target,
            hooks,
            priority: Priority::Normal,
            kinds: Mutex::new(HashSet::new()),
        }
    }

    /// Forwarder on the bus of the runtime's attached host
    pub fn from_runtime(
        runtime: &EventRuntime,
        target: EventManager,
        hooks: Arc<dyn CategoryHooks>,
    ) -> EventResult<Self> {
        let host = runtime.host().ok_or(EventError::HostUnavailable)?;
        Ok(Self::new(host.bus().clone(), target, hooks))
    }

    /// Priority used for registrations made after this call
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Forward host events of type `E`
    ///
    /// Returns `Ok(false)` if `E` was already being forwarded.
    pub fn forward<E: Event>(&self) -> EventResult<bool> {
        self.forward_kind(HostEventKind::of::<E>())
    }

    /// Forward host events of `kind`
    pub fn forward_kind(&self, kind: HostEventKind) -> EventResult<bool> {
        let mut kinds = self.kinds.lock();
        if kinds.contains(&kind) {
            return Ok(false);
        }

        let target = self.target.clone();
        let hooks = self.hooks.clone();
        let executor: HostExecutor = Arc::new(move |event: &SharedEvent| {
            let source = target.owner().clone();
            let routed = panic::catch_unwind(AssertUnwindSafe(|| {
                route(hooks.as_ref(), Some(&source), event)
            }));
            if let Err(payload) = routed {
                tracing::error!(
                    "Category hook panicked on host event {}: {}",
                    event.name(),
                    panic_message(payload)
                );
            }
            if let Err(e) = target.call_shared(Some(&source), event.clone()) {
                tracing::warn!("Failed to forward host event {}: {}", event.name(), e);
            }
        });

        self.bus
            .register_event(self.listener, kind, self.priority, executor)?;
        kinds.insert(kind);
        tracing::debug!(
            "Forwarding host event {} into manager '{}'",
            kind,
            self.target.owner().name()
        );
        Ok(true)
    }

    /// Whether `kind` is being forwarded
    pub fn is_forwarding(&self, kind: HostEventKind) -> bool {
        self.kinds.lock().contains(&kind)
    }

    /// Number of forwarded kinds
    pub fn forwarded_count(&self) -> usize {
        self.kinds.lock().len()
    }

    pub fn listener_id(&self) -> HostListenerId {
        self.listener
    }

    /// Leave the host bus
    pub fn detach(&self) {
        self.bus.unregister_all(self.listener);
        let count = {
            let mut kinds = self.kinds.lock();
            let count = kinds.len();
            kinds.clear();
            count
        };
        tracing::debug!("Host forwarder detached ({} kinds)", count);
    }
}
