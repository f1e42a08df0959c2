//! Seen-event tracking
//!
//! A manager remembers each event occurrence it dispatched for a short
//! window of ticks and drops repeat deliveries. Entries hold a strong
//! reference to the event so its address cannot be reused while the
//! entry is alive.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use canopy_sdk::SharedEvent;

/// Identity of an event occurrence (its allocation address)
pub(crate) fn identity(event: &SharedEvent) -> usize {
    Arc::as_ptr(event) as *const () as usize
}

pub(crate) struct DedupSet {
    /// Ticks an entry stays alive
    window: u64,
    /// identity -> (expires_at, event)
    entries: HashMap<usize, (u64, SharedEvent)>,
    /// (expires_at, identity), oldest first; may hold stale pairs
    expiry: VecDeque<(u64, usize)>,
}

impl DedupSet {
    pub fn new(window: u64) -> Self {
        Self {
            window: window.max(1),
            entries: HashMap::new(),
            expiry: VecDeque::new(),
        }
    }

    /// Drop entries whose window has passed
    pub fn purge(&mut self, now: u64) {
        while let Some(&(expires_at, id)) = self.expiry.front() {
            if expires_at > now {
                break;
            }
            self.expiry.pop_front();
            if self.entries.get(&id).is_some_and(|(at, _)| *at == expires_at) {
                self.entries.remove(&id);
            }
        }
    }

    /// Record `event`; returns `false` if it was already seen
    pub fn insert(&mut self, event: &SharedEvent, now: u64) -> bool {
        self.purge(now);
        let id = identity(event);
        if self.entries.contains_key(&id) {
            return false;
        }
        let expires_at = now + self.window;
        self.entries.insert(id, (expires_at, event.clone()));
        self.expiry.push_back((expires_at, id));
        true
    }

    /// Forget `event`; returns `true` if it was recorded
    pub fn remove(&mut self, event: &SharedEvent) -> bool {
        self.entries.remove(&identity(event)).is_some()
    }

    pub fn contains(&mut self, event: &SharedEvent, now: u64) -> bool {
        self.purge(now);
        self.entries.contains_key(&identity(event))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.expiry.clear();
    }
}
