//! # Region Protection Example
//!
//! Every protected region gets its own event manager below the plugin's
//! manager. Block events arrive from the host bus through a
//! `HostForwarder`, are routed to the region they fall in, and are
//! cancelled by that region's guard. The host sees the cancellation
//! through the event's shared cancel cell.
//!
//! ## Features Demonstrated
//! - `HostForwarder` - Bringing native host events into canopy
//! - `CategoryHooks` - Per-category routing (block events here)
//! - `#[event_listener]` / `#[subscribe]` - Listener objects
//! - `on_call` - Re-publishing an event into a child manager
//! - `invoked_for_cancelled` - Auditing cancelled events
//!
//! ## Usage
//! ```ignore
//! let plugin = RegionProtection::init(&runtime)?;
//! plugin.protect("spawn", -50, 50)?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use canopy_core::events::{CancelState, Cancellable};
use canopy_core::{
    event_listener, CategoryHooks, Event, EventManager, EventResult, EventRuntime, HostForwarder,
    Owner, SharedEvent,
};

/// A block broken in the world, fired by the host
#[derive(Event)]
#[event(category = "block")]
pub struct BlockBreak {
    pub x: i32,
    pub player: String,
    #[event(cancel)]
    pub cancel: CancelState,
}

impl BlockBreak {
    pub fn new(x: i32, player: &str) -> Self {
        Self {
            x,
            player: player.to_string(),
            cancel: CancelState::new(),
        }
    }
}

/// Cancels breaks inside one region and counts what it denied
pub struct RegionGuard {
    name: String,
    denied: AtomicUsize,
}

#[event_listener]
impl RegionGuard {
    #[subscribe(priority = "high")]
    fn on_break(&self, event: &BlockBreak) {
        event.cancel.cancel();
        tracing::info!("{} may not build in region '{}'", event.player, self.name);
    }

    #[subscribe(priority = "monitor", invoked_for_cancelled = true)]
    fn audit(&self, event: &BlockBreak) {
        if event.cancel.is_cancelled() {
            self.denied.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl RegionGuard {
    pub fn denied(&self) -> usize {
        self.denied.load(Ordering::SeqCst)
    }
}

/// Counts block events crossing the host boundary
#[derive(Default)]
struct BlockMeter {
    seen: AtomicUsize,
}

impl CategoryHooks for BlockMeter {
    fn on_block(&self, _source: Option<&Owner>, _event: &SharedEvent) {
        self.seen.fetch_add(1, Ordering::Relaxed);
    }
}

struct Region {
    min: i32,
    max: i32,
    manager: EventManager,
    guard: Arc<RegionGuard>,
}

type Regions = Arc<RwLock<HashMap<String, Region>>>;

pub struct RegionProtection {
    owner: Owner,
    manager: EventManager,
    forwarder: HostForwarder,
    meter: Arc<BlockMeter>,
    regions: Regions,
}

impl RegionProtection {
    /// Create the plugin manager and start forwarding block events
    ///
    /// Requires a host attached to the runtime.
    pub fn init(runtime: &EventRuntime) -> EventResult<Self> {
        let owner = runtime.register_owner("region_protection");
        let manager = runtime.create_manager(&owner)?;
        let meter = Arc::new(BlockMeter::default());
        let regions: Regions = Arc::new(RwLock::new(HashMap::new()));

        // Hand each block event to the region it falls in
        let lookup = regions.clone();
        manager.on_call(&owner, move |source, event| {
            let Some(x) = event.downcast_ref::<BlockBreak>().map(|b| b.x) else {
                return;
            };
            let target = lookup
                .read()
                .values()
                .find(|region| (region.min..=region.max).contains(&x))
                .map(|region| region.manager.clone());
            if let Some(region) = target {
                if let Err(e) = region.call_shared(source, event.clone()) {
                    tracing::warn!("Region dispatch failed: {}", e);
                }
            }
        })?;

        let forwarder = HostForwarder::from_runtime(runtime, manager.clone(), meter.clone())?;
        forwarder.forward::<BlockBreak>()?;

        tracing::info!("Region Protection plugin initialized!");
        Ok(Self {
            owner,
            manager,
            forwarder,
            meter,
            regions,
        })
    }

    /// Protect the blocks in `min..=max` under `name`
    ///
    /// Protecting an existing name replaces the old region.
    pub fn protect(&self, name: &str, min: i32, max: i32) -> EventResult<Arc<RegionGuard>> {
        let manager = self.manager.create_child(&self.owner)?;
        let guard = Arc::new(RegionGuard {
            name: name.to_string(),
            denied: AtomicUsize::new(0),
        });
        manager.register_listener(guard.clone())?;

        let previous = self.regions.write().insert(
            name.to_string(),
            Region {
                min,
                max,
                manager,
                guard: guard.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.manager.dispose();
        }
        tracing::info!("Protected region '{}' ({}..={})", name, min, max);
        Ok(guard)
    }

    /// Drop a region; returns false if it did not exist
    pub fn unprotect(&self, name: &str) -> bool {
        match self.regions.write().remove(name) {
            Some(region) => {
                tracing::info!(
                    "Region '{}' removed after {} denied breaks",
                    name,
                    region.guard.denied()
                );
                region.manager.dispose();
                true
            }
            None => false,
        }
    }

    /// Block events seen crossing the host boundary
    pub fn blocks_seen(&self) -> usize {
        self.meter.seen.load(Ordering::Relaxed)
    }

    /// Stop forwarding and dispose every region manager
    pub fn shutdown(&self) {
        self.forwarder.detach();
        for (_, region) in self.regions.write().drain() {
            region.manager.dispose();
        }
        self.manager.dispose();
    }
}
