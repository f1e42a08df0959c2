//! # Ping Counter Example
//!
//! The smallest useful canopy plugin: one counter on the root manager, one
//! on a child manager, and a single call that reaches both.
//!
//! ## Features Demonstrated
//! - `#[derive(Event)]` - Declaring an event type
//! - `EventRuntime::register_owner` - One owner per plugin
//! - `EventManager::with_parent` - Building a manager tree
//! - Parent-first delivery when calling on a child
//!
//! ## Usage
//! ```ignore
//! let runtime = EventRuntime::default();
//! let counter = ping_counter::PingCounter::init(&runtime)?;
//! counter.ping()?;
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use canopy_core::{Event, EventManager, EventResult, EventRuntime, Owner, SubscribeOptions};

/// Fired once per ping
#[derive(Event)]
pub struct PingEvent;

/// Counters for the root and child managers
#[derive(Debug, Default)]
pub struct PingCounts {
    pub root: AtomicUsize,
    pub child: AtomicUsize,
}

pub struct PingCounter {
    child: EventManager,
    counts: Arc<PingCounts>,
}

impl PingCounter {
    /// Register the counters and return the plugin handle
    pub fn init(runtime: &EventRuntime) -> EventResult<Self> {
        let owner: Owner = runtime.register_owner("ping_counter");
        let child = EventManager::with_parent(runtime, &owner, Some(runtime.root()))?;
        let counts = Arc::new(PingCounts::default());

        let root_counts = counts.clone();
        runtime
            .root()
            .register::<PingEvent, _>(&owner, SubscribeOptions::default(), move |_| {
                root_counts.root.fetch_add(1, Ordering::SeqCst);
            })?;

        let child_counts = counts.clone();
        child.register::<PingEvent, _>(&owner, SubscribeOptions::default(), move |_| {
            child_counts.child.fetch_add(1, Ordering::SeqCst);
        })?;

        tracing::info!("Ping Counter plugin initialized!");
        Ok(Self { child, counts })
    }

    /// Call a fresh ping on the child manager
    pub fn ping(&self) -> EventResult<()> {
        self.child.call(Some(self.child.owner()), Arc::new(PingEvent))?;
        Ok(())
    }

    pub fn counts(&self) -> &PingCounts {
        &self.counts
    }
}
