//! Dispatch agents
//!
//! One agent per event type per manager. The agent owns the ordered
//! subscriber list and runs it with cancellation gating.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use canopy_sdk::Event;

use super::owner::Owner;
use super::registry::SubscriberRegistry;
use super::subscriber::{Subscriber, SubscriberKey};

/// Dispatch tuning shared by every agent of a runtime
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    /// Subscribers running longer than this are logged
    pub slow_subscriber_warn: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            slow_subscriber_warn: Duration::from_millis(1),
        }
    }
}

/// Runs the subscribers of one event type
pub(crate) struct DispatchAgent {
    event_name: &'static str,
    registry: Mutex<SubscriberRegistry>,
}

impl DispatchAgent {
    pub fn new(event_name: &'static str) -> Self {
        Self {
            event_name,
            registry: Mutex::new(SubscriberRegistry::default()),
        }
    }

    pub fn event_name(&self) -> &'static str {
        self.event_name
    }

    pub fn add_subscriber(&self, subscriber: Arc<Subscriber>) {
        self.registry.lock().add(subscriber);
    }

    pub fn remove_subscriber(&self, key: SubscriberKey) -> Option<Arc<Subscriber>> {
        self.registry.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn dispose(&self) {
        self.registry.lock().dispose();
    }

    /// Run every subscriber in priority order
    ///
    /// The subscriber list is snapshotted first, so registrations made
    /// during dispatch take effect on the next call. The cancelled flag is
    /// re-read before each subscriber, so an earlier subscriber can
    /// un-cancel the event for later ones.
    pub fn call(&self, source: Option<&Owner>, event: &dyn Event, settings: &DispatchSettings) {
        let subscribers = self.registry.lock().snapshot();

        tracing::trace!(
            "Dispatching {} to {} subscribers (source: {})",
            self.event_name,
            subscribers.len(),
            source.map(Owner::name).unwrap_or("host")
        );

        for subscriber in &subscribers {
            if event.is_cancelled() && !subscriber.invoked_for_cancelled() {
                tracing::trace!(
                    "Skipping {} subscriber of {} (event cancelled)",
                    subscriber.owner().name(),
                    self.event_name
                );
                continue;
            }

            let start = Instant::now();
            if let Err(e) = subscriber.invoke(event) {
                tracing::error!(
                    "Subscriber of {} owned by '{}' failed: {}",
                    self.event_name,
                    subscriber.owner().name(),
                    e
                );
            }

            let elapsed = start.elapsed();
            if elapsed > settings.slow_subscriber_warn {
                tracing::warn!(
                    "Subscriber of {} owned by '{}' took {:?}",
                    self.event_name,
                    subscriber.owner().name(),
                    elapsed
                );
            }
        }
    }
}
