//! Priority-ordered subscriber list

use std::sync::Arc;

use super::subscriber::{Subscriber, SubscriberKey};

/// Subscribers for one event type, sorted by priority
///
/// Within a priority, subscribers keep their registration order.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    subscribers: Vec<Arc<Subscriber>>,
}

impl SubscriberRegistry {
    pub fn add(&mut self, subscriber: Arc<Subscriber>) {
        let priority = subscriber.priority();
        let index = self
            .subscribers
            .partition_point(|s| s.priority() <= priority);
        self.subscribers.insert(index, subscriber);
    }

    /// Remove a subscriber; removing an unknown key is a no-op
    pub fn remove(&mut self, key: SubscriberKey) -> Option<Arc<Subscriber>> {
        let index = self.subscribers.iter().position(|s| s.key() == key)?;
        Some(self.subscribers.remove(index))
    }

    /// Point-in-time copy for dispatch
    pub fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.subscribers.clone()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Mark every subscriber disposed and empty the list
    pub fn dispose(&mut self) {
        for subscriber in self.subscribers.drain(..) {
            subscriber.dispose();
        }
    }
}
