//! Timer struct and flags

use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;
use slotmap::new_key_type;

use crate::events::OwnerKey;

new_key_type! {
    /// Key for registered timers
    pub struct TimerKey;
}

bitflags! {
    /// Flags that control timer behavior
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimerFlags: u32 {
        /// Timer repeats at the specified interval until cancelled
        const REPEAT = 0x01;
        /// Timer is removed when its owner is disabled
        const STOP_ON_OWNER_DISABLE = 0x02;
    }
}

pub(crate) type TimerCallback = Arc<Mutex<Box<dyn FnMut() + Send + 'static>>>;

/// A scheduled timer that fires a callback after a number of ticks
pub(crate) struct Timer {
    /// Ticks between executions (or delay for one-shot timers)
    pub interval: u64,
    /// The callback to execute (wrapped in Mutex for FnMut support)
    pub callback: TimerCallback,
    /// Behavior flags
    pub flags: TimerFlags,
    /// Owner the timer belongs to, if any
    pub owner: Option<OwnerKey>,
    /// Tick at which this timer should next fire
    pub next_fire: u64,
}

impl Timer {
    /// Create a new timer due `interval` ticks after `now`
    pub fn new<F>(
        now: u64,
        interval: u64,
        flags: TimerFlags,
        owner: Option<OwnerKey>,
        callback: F,
    ) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        // Repeating timers fire at most once per tick
        let interval = if flags.contains(TimerFlags::REPEAT) {
            interval.max(1)
        } else {
            interval
        };
        Self {
            interval,
            callback: Arc::new(Mutex::new(Box::new(callback))),
            flags,
            owner,
            next_fire: now + interval,
        }
    }

    pub fn is_due(&self, now: u64) -> bool {
        now >= self.next_fire
    }

    pub fn stops_with(&self, owner: OwnerKey) -> bool {
        self.flags.contains(TimerFlags::STOP_ON_OWNER_DISABLE) && self.owner == Some(owner)
    }
}
