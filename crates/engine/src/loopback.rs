//! In-process host event bus
//!
//! A minimal native bus: executors are grouped by event kind and run in
//! priority order, lowest first, when an event of that kind is fired.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use canopy_sdk::{Priority, SharedEvent};

use crate::bus::{HostEventBus, HostEventKind, HostExecutor, HostListenerId};
use crate::error::HostError;

/// A registered executor
struct Registration {
    listener: HostListenerId,
    kind: HostEventKind,
    priority: Priority,
    executor: HostExecutor,
}

/// Loopback implementation of [`HostEventBus`]
#[derive(Default)]
pub struct LoopbackBus {
    /// Registrations sorted by priority, lowest first
    registrations: RwLock<Vec<Registration>>,

    /// Number of events fired through this bus
    fired: AtomicU64,

    /// Last listener ID handed out
    last_listener: AtomicU64,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executors registered for `kind`
    pub fn registration_count(&self, kind: HostEventKind) -> usize {
        self.registrations
            .read()
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Total number of events fired so far
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }
}

impl HostEventBus for LoopbackBus {
    fn allocate_listener(&self) -> HostListenerId {
        HostListenerId::new(self.last_listener.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn register_event(
        &self,
        listener: HostListenerId,
        kind: HostEventKind,
        priority: Priority,
        executor: HostExecutor,
    ) -> Result<(), HostError> {
        let mut registrations = self.registrations.write();
        // Keep the list sorted by priority, registration order within a priority
        let index = registrations.partition_point(|r| r.priority <= priority);
        registrations.insert(
            index,
            Registration {
                listener,
                kind,
                priority,
                executor,
            },
        );
        tracing::trace!(
            "Loopback bus: listener {} registered for {} at {}",
            listener.as_u64(),
            kind,
            priority
        );
        Ok(())
    }

    fn unregister_all(&self, listener: HostListenerId) {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| r.listener != listener);
        let removed = before - registrations.len();
        if removed > 0 {
            tracing::debug!(
                "Loopback bus: removed {} registrations for listener {}",
                removed,
                listener.as_u64()
            );
        }
    }

    fn call_event(&self, event: &SharedEvent) -> Result<(), HostError> {
        let kind = HostEventKind::of_event(&**event);
        self.fired.fetch_add(1, Ordering::Relaxed);

        // Executors may register or fire more events, so run them unlocked
        let executors: Vec<HostExecutor> = self
            .registrations
            .read()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.executor.clone())
            .collect();

        for executor in executors {
            executor(event);
        }
        Ok(())
    }
}
