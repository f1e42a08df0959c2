//! Tick scheduler
//!
//! The runtime's notion of time is a tick counter advanced by
//! [`EventRuntime::tick`](crate::EventRuntime::tick), which the host calls
//! once per server tick. Each tick the scheduler:
//! - Runs queued tasks (posted from any thread)
//! - Fires timers that are due
//!
//! # Example
//!
//! ```
//! use canopy_core::scheduler::Scheduler;
//!
//! let scheduler = Scheduler::new();
//! let key = scheduler.run_repeating(20, || println!("one second"));
//! scheduler.tick();
//! scheduler.cancel(key);
//! ```

mod queue;
mod timer;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use slotmap::SlotMap;

pub use queue::{QueueError, Task, QUEUE_CAPACITY};
pub use timer::{TimerFlags, TimerKey};

use crate::error::panic_message;
use crate::events::{Owner, OwnerKey};
use queue::TaskQueue;
use timer::{Timer, TimerCallback};

/// Tick budget above which a warning is logged
const SLOW_TICK: Duration = Duration::from_millis(1);

/// Tick counter, timers and the main thread task queue
pub struct Scheduler {
    tick: AtomicU64,
    timers: Mutex<SlotMap<TimerKey, Timer>>,
    tasks: TaskQueue,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tick: AtomicU64::new(0),
            timers: Mutex::new(SlotMap::with_key()),
            tasks: TaskQueue::new(),
        }
    }

    /// Number of ticks processed so far
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    /// Add a one-shot timer that fires after `delay` ticks
    ///
    /// A delay of zero fires on the next tick.
    pub fn run_later<F>(&self, delay: u64, callback: F) -> TimerKey
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule(delay, TimerFlags::empty(), None, callback)
    }

    /// Add a timer that fires every `interval` ticks until cancelled
    pub fn run_repeating<F>(&self, interval: u64, callback: F) -> TimerKey
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule(interval, TimerFlags::REPEAT, None, callback)
    }

    /// Add a timer with custom flags, optionally bound to an owner
    ///
    /// Timers bound to an owner with [`TimerFlags::STOP_ON_OWNER_DISABLE`]
    /// are removed when that owner is disabled.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let key = scheduler.schedule(
    ///     100,
    ///     TimerFlags::REPEAT | TimerFlags::STOP_ON_OWNER_DISABLE,
    ///     Some(&owner),
    ///     || { /* ... */ },
    /// );
    /// ```
    pub fn schedule<F>(
        &self,
        interval: u64,
        flags: TimerFlags,
        owner: Option<&Owner>,
        callback: F,
    ) -> TimerKey
    where
        F: FnMut() + Send + 'static,
    {
        let timer = Timer::new(
            self.current_tick(),
            interval,
            flags,
            owner.map(Owner::key),
            callback,
        );
        self.timers.lock().insert(timer)
    }

    /// Remove/cancel a timer
    ///
    /// Returns `true` if the timer was found and removed.
    pub fn cancel(&self, key: TimerKey) -> bool {
        self.timers.lock().remove(key).is_some()
    }

    /// Number of live timers
    pub fn timer_count(&self) -> usize {
        self.timers.lock().len()
    }

    /// Queue a task to run on the next tick
    ///
    /// Safe to call from any thread.
    pub fn queue_task<F>(&self, task: F) -> Result<(), QueueError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.push(Box::new(task))
    }

    /// Number of tasks waiting for the next tick
    pub fn queued_task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Advance the tick counter, run queued tasks, then fire due timers
    ///
    /// Returns the new tick number.
    pub fn tick(&self) -> u64 {
        let start = Instant::now();
        let now = self.tick.fetch_add(1, Ordering::AcqRel) + 1;

        let tasks = self.tasks.process();
        let fired = self.process_timers(now);

        let elapsed = start.elapsed();
        if elapsed > SLOW_TICK {
            tracing::warn!(
                "Tick {} took {:?} ({} tasks, {} timers)",
                now,
                elapsed,
                tasks,
                fired
            );
        }
        now
    }

    /// Fire due timers; callbacks run without the registry lock held
    fn process_timers(&self, now: u64) -> usize {
        let due: Vec<(TimerKey, TimerCallback)> = self
            .timers
            .lock()
            .iter()
            .filter(|(_, timer)| timer.is_due(now))
            .map(|(key, timer)| (key, timer.callback.clone()))
            .collect();

        for (key, callback) in &due {
            let mut callback = callback.lock();
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (*callback)())) {
                tracing::error!(
                    "Timer {:?} panicked on tick {}: {}",
                    key,
                    now,
                    panic_message(payload)
                );
            }
        }

        let mut timers = self.timers.lock();
        for (key, _) in &due {
            let repeat = match timers.get_mut(*key) {
                Some(timer) if timer.flags.contains(TimerFlags::REPEAT) => {
                    timer.next_fire = now + timer.interval;
                    true
                }
                Some(_) => false,
                // Cancelled by a callback
                None => continue,
            };
            if !repeat {
                timers.remove(*key);
            }
        }
        due.len()
    }

    /// Remove timers bound to `owner` with STOP_ON_OWNER_DISABLE
    pub(crate) fn cancel_owner_timers(&self, owner: OwnerKey) -> usize {
        let mut timers = self.timers.lock();
        let before = timers.len();
        timers.retain(|_, timer| !timer.stops_with(owner));
        let removed = before - timers.len();
        if removed > 0 {
            tracing::debug!("Removed {} timers on owner disable", removed);
        }
        removed
    }

    /// Drop every timer and queued task
    pub(crate) fn clear(&self) {
        self.timers.lock().clear();
        let dropped = self.tasks.clear();
        if dropped > 0 {
            tracing::debug!("Dropped {} queued tasks on shutdown", dropped);
        }
    }
}
