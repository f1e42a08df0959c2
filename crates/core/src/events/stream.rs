//! Call streams
//!
//! Observers notified of every event a manager dispatches, regardless of
//! type. Used by the category bridge to fan events out to the host.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};

use canopy_sdk::SharedEvent;

use super::owner::{Owner, OwnerKey};
use crate::error::panic_message;

new_key_type! {
    /// Key for call stream observers
    pub struct StreamKey;
}

/// Callback invoked with the source and event of every dispatch
pub type StreamCallback = Arc<dyn Fn(Option<&Owner>, &SharedEvent) + Send + Sync + 'static>;

#[derive(Clone)]
pub(crate) struct StreamObserver {
    owner: Owner,
    callback: StreamCallback,
}

#[derive(Default)]
pub(crate) struct CallStream {
    observers: SlotMap<StreamKey, StreamObserver>,
}

impl CallStream {
    pub fn insert(&mut self, owner: Owner, callback: StreamCallback) -> StreamKey {
        self.observers.insert(StreamObserver { owner, callback })
    }

    pub fn remove(&mut self, key: StreamKey) -> bool {
        self.observers.remove(key).is_some()
    }

    /// Remove every observer of `owner`, returning how many were removed
    pub fn remove_owner(&mut self, owner: OwnerKey) -> usize {
        let before = self.observers.len();
        self.observers.retain(|_, o| o.owner.key() != owner);
        before - self.observers.len()
    }

    pub fn snapshot(&self) -> Vec<StreamObserver> {
        self.observers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

/// Notify observers in registration order, isolating panics
pub(crate) fn publish(observers: &[StreamObserver], source: Option<&Owner>, event: &SharedEvent) {
    for observer in observers {
        let result = panic::catch_unwind(AssertUnwindSafe(|| (observer.callback)(source, event)));
        if let Err(payload) = result {
            tracing::error!(
                "Call stream observer owned by '{}' panicked on {}: {}",
                observer.owner.name(),
                event.name(),
                panic_message(payload)
            );
        }
    }
}
