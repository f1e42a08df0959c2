//! Event manager - registration, hierarchical dispatch and teardown
//!
//! Managers form a tree. Calling an event on a manager first calls it on
//! the parent chain (root first), then notifies the manager's own call
//! stream and subscribers. Every manager remembers the occurrences it
//! dispatched for a few ticks, so an event re-published through another
//! path (a forwarder, a child re-calling its parent) is delivered at most
//! once per manager.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use slotmap::{new_key_type, SlotMap};

use canopy_sdk::{Event, SharedEvent};

use super::agent::DispatchAgent;
use super::builder::SubscriberBuilder;
use super::dedup::DedupSet;
use super::listener::{Listener, ListenerId, ListenerRegistrar};
use super::owner::{Owner, OwnerKey};
use super::stream::{self, CallStream, StreamCallback, StreamKey};
use super::subscriber::{PendingSubscriber, SubscribeOptions, Subscriber, SubscriberKey};
use crate::error::{BoxError, EventError, EventResult};
use crate::runtime::{EventRuntime, RuntimeShared};

new_key_type! {
    /// Key for managers registered with the runtime
    pub struct ManagerKey;
}

/// What a [`Subscription`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    /// A typed subscriber
    Subscriber(SubscriberKey),
    /// A call stream observer
    Stream(StreamKey),
}

/// Handle returned by registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    manager: ManagerKey,
    kind: SubscriptionKind,
}

impl Subscription {
    pub fn manager(&self) -> ManagerKey {
        self.manager
    }

    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }
}

/// A listener object registered on a manager
struct RegisteredListener {
    type_name: &'static str,
    owner: OwnerKey,
    subscribers: Vec<SubscriberKey>,
    /// Keeps the listener allocation (and so its identity) alive
    _instance: Arc<dyn std::any::Any + Send + Sync>,
}

struct ManagerState {
    disposed: bool,
    agents: HashMap<TypeId, Arc<DispatchAgent>>,
    subscribers: SlotMap<SubscriberKey, Arc<Subscriber>>,
    by_owner: HashMap<OwnerKey, HashSet<SubscriberKey>>,
    listeners: HashMap<ListenerId, RegisteredListener>,
    stream: CallStream,
    seen: DedupSet,
}

impl ManagerState {
    fn new(dedup_window: u64) -> Self {
        Self {
            disposed: false,
            agents: HashMap::new(),
            subscribers: SlotMap::with_key(),
            by_owner: HashMap::new(),
            listeners: HashMap::new(),
            stream: CallStream::default(),
            seen: DedupSet::new(dedup_window),
        }
    }

    fn insert_subscriber(
        &mut self,
        owner: &Owner,
        listener: Option<ListenerId>,
        pending: PendingSubscriber,
    ) -> SubscriberKey {
        let event_name = pending.event_name;
        let agent = self
            .agents
            .entry(pending.event_type)
            .or_insert_with(|| Arc::new(DispatchAgent::new(event_name)))
            .clone();

        let key = self
            .subscribers
            .insert_with_key(|key| {
                Arc::new(Subscriber::new(key, owner.clone(), listener, pending))
            });
        agent.add_subscriber(self.subscribers[key].clone());
        self.by_owner.entry(owner.key()).or_default().insert(key);
        key
    }

    fn remove_subscriber(&mut self, key: SubscriberKey) -> Option<Arc<Subscriber>> {
        let subscriber = self.subscribers.remove(key)?;
        if let Some(agent) = self.agents.get(&subscriber.event_type()) {
            agent.remove_subscriber(key);
        }
        if let Some(keys) = self.by_owner.get_mut(&subscriber.owner().key()) {
            keys.remove(&key);
            if keys.is_empty() {
                self.by_owner.remove(&subscriber.owner().key());
            }
        }
        subscriber.dispose();
        Some(subscriber)
    }
}

pub(crate) struct ManagerShared {
    key: ManagerKey,
    owner: Owner,
    parent: Option<EventManager>,
    runtime: Arc<RuntimeShared>,
    state: Mutex<ManagerState>,
}

/// A node in the event manager tree
///
/// Cheap to clone; clones share the same manager.
#[derive(Clone)]
pub struct EventManager {
    shared: Arc<ManagerShared>,
}

impl EventManager {
    /// Create a manager owned by `owner` whose parent is the runtime root
    pub fn new(runtime: &EventRuntime, owner: &Owner) -> EventResult<Self> {
        Self::with_parent(runtime, owner, Some(runtime.root()))
    }

    /// Create a manager with an explicit parent (or none)
    pub fn with_parent(
        runtime: &EventRuntime,
        owner: &Owner,
        parent: Option<&EventManager>,
    ) -> EventResult<Self> {
        if let Some(parent) = parent {
            parent.ensure_live()?;
        }
        runtime
            .shared()
            .create_manager(owner, parent.cloned())
    }

    /// Create a manager owned by `owner` with this manager as its parent
    pub fn create_child(&self, owner: &Owner) -> EventResult<EventManager> {
        self.ensure_live()?;
        self.shared.runtime.create_manager(owner, Some(self.clone()))
    }

    pub(crate) fn build(
        key: ManagerKey,
        owner: Owner,
        parent: Option<EventManager>,
        runtime: Arc<RuntimeShared>,
    ) -> Self {
        let state = ManagerState::new(runtime.dedup_window());
        Self {
            shared: Arc::new(ManagerShared {
                key,
                owner,
                parent,
                runtime,
                state: Mutex::new(state),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<ManagerShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<ManagerShared> {
        Arc::downgrade(&self.shared)
    }

    /// Runtime-issued key
    pub fn key(&self) -> ManagerKey {
        self.shared.key
    }

    /// Owner of this manager
    pub fn owner(&self) -> &Owner {
        &self.shared.owner
    }

    /// Parent manager, if any
    pub fn parent(&self) -> Option<&EventManager> {
        self.shared.parent.as_ref()
    }

    /// Whether [`dispose`](Self::dispose) was called
    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }

    fn disposed_error(&self) -> EventError {
        EventError::Disposed {
            owner: self.shared.owner.name().to_string(),
        }
    }

    fn lock_live(&self) -> EventResult<MutexGuard<'_, ManagerState>> {
        let state = self.shared.state.lock();
        if state.disposed {
            return Err(self.disposed_error());
        }
        Ok(state)
    }

    fn ensure_live(&self) -> EventResult<()> {
        self.lock_live().map(drop)
    }

    fn ensure_active(owner: &Owner) -> EventResult<()> {
        if owner.is_active() {
            Ok(())
        } else {
            Err(EventError::InactiveOwner(owner.name().to_string()))
        }
    }

    fn subscription(&self, kind: SubscriptionKind) -> Subscription {
        Subscription {
            manager: self.shared.key,
            kind,
        }
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Subscribe `handler` to events of type `E` on behalf of `owner`
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use canopy_core::events::{Priority, SubscribeOptions};
    /// use canopy_core::{Event, EventRuntime};
    ///
    /// #[derive(Event)]
    /// struct Ping;
    ///
    /// let runtime = EventRuntime::default();
    /// let owner = runtime.register_owner("greeter");
    /// runtime
    ///     .root()
    ///     .register::<Ping, _>(&owner, SubscribeOptions::with_priority(Priority::High), |_| {
    ///         println!("pong");
    ///     })
    ///     .unwrap();
    /// runtime.root().call(None, Arc::new(Ping)).unwrap();
    /// ```
    pub fn register<E, F>(
        &self,
        owner: &Owner,
        options: SubscribeOptions,
        handler: F,
    ) -> EventResult<Subscription>
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let pending = PendingSubscriber::typed::<E, _>(options, move |event| {
            handler(event);
            Ok(())
        });
        self.insert_subscriber(owner, pending)
    }

    /// Subscribe a fallible `handler`; its errors are logged, never returned
    pub fn try_register<E, F, Err>(
        &self,
        owner: &Owner,
        options: SubscribeOptions,
        handler: F,
    ) -> EventResult<Subscription>
    where
        E: Event,
        F: Fn(&E) -> Result<(), Err> + Send + Sync + 'static,
        Err: Into<BoxError>,
    {
        let pending = PendingSubscriber::typed::<E, _>(options, move |event| {
            handler(event).map_err(Into::into)
        });
        self.insert_subscriber(owner, pending)
    }

    /// Start building a subscription for events of type `E`
    pub fn subscribe<E: Event>(&self, owner: &Owner) -> SubscriberBuilder<'_, E> {
        SubscriberBuilder::new(self, owner.clone())
    }

    fn insert_subscriber(
        &self,
        owner: &Owner,
        pending: PendingSubscriber,
    ) -> EventResult<Subscription> {
        Self::ensure_active(owner)?;
        let event_name = pending.event_name;
        let priority = pending.options.priority;
        let key = self.lock_live()?.insert_subscriber(owner, None, pending);
        self.shared.runtime.note_owner(owner.key(), self.shared.key);

        tracing::debug!(
            "Registered {} subscriber for {} on manager '{}' (owner '{}')",
            priority,
            event_name,
            self.shared.owner.name(),
            owner.name()
        );
        Ok(self.subscription(SubscriptionKind::Subscriber(key)))
    }

    /// Register every subscription declared by `listener`, owned by this
    /// manager's owner
    ///
    /// Returns the number of subscribers created. Registering the same
    /// listener object twice fails with [`EventError::DuplicateListener`].
    pub fn register_listener<L: Listener>(&self, listener: Arc<L>) -> EventResult<usize> {
        let owner = self.shared.owner.clone();
        self.register_listener_for(&owner, listener)
    }

    /// Register every subscription declared by `listener`, owned by `owner`
    pub fn register_listener_for<L: Listener>(
        &self,
        owner: &Owner,
        listener: Arc<L>,
    ) -> EventResult<usize> {
        Self::ensure_active(owner)?;
        let id = ListenerId::of(&listener);
        let type_name = std::any::type_name::<L>();
        let duplicate = || EventError::DuplicateListener {
            listener: type_name,
            owner: self.shared.owner.name().to_string(),
        };

        if self.lock_live()?.listeners.contains_key(&id) {
            return Err(duplicate());
        }

        // Listener code runs without the manager lock held
        let mut registrar = ListenerRegistrar::new(listener.clone());
        L::subscribe(&mut registrar);
        let pending = registrar.into_pending();

        let count = {
            let mut state = self.lock_live()?;
            if state.listeners.contains_key(&id) {
                return Err(duplicate());
            }
            let subscribers: Vec<SubscriberKey> = pending
                .into_iter()
                .map(|pending| state.insert_subscriber(owner, Some(id), pending))
                .collect();
            let count = subscribers.len();
            state.listeners.insert(
                id,
                RegisteredListener {
                    type_name,
                    owner: owner.key(),
                    subscribers,
                    _instance: listener,
                },
            );
            count
        };
        self.shared.runtime.note_owner(owner.key(), self.shared.key);

        tracing::debug!(
            "Registered listener {} with {} subscribers on manager '{}'",
            type_name,
            count,
            self.shared.owner.name()
        );
        Ok(count)
    }

    /// Remove every subscriber that came from `listener`
    ///
    /// Returns `false` if the listener was not registered here.
    pub fn unregister_listener<L: Listener>(&self, listener: &Arc<L>) -> EventResult<bool> {
        let mut state = self.lock_live()?;
        let Some(entry) = state.listeners.remove(&ListenerId::of(listener)) else {
            return Ok(false);
        };
        for key in &entry.subscribers {
            state.remove_subscriber(*key);
        }
        tracing::debug!(
            "Unregistered listener {} from manager '{}'",
            entry.type_name,
            self.shared.owner.name()
        );
        Ok(true)
    }

    /// Observe every event this manager dispatches, regardless of type
    ///
    /// Observers run after the parent chain and before typed subscribers.
    pub fn on_call<F>(&self, owner: &Owner, callback: F) -> EventResult<Subscription>
    where
        F: Fn(Option<&Owner>, &SharedEvent) + Send + Sync + 'static,
    {
        Self::ensure_active(owner)?;
        let callback: StreamCallback = Arc::new(callback);
        let key = self.lock_live()?.stream.insert(owner.clone(), callback);
        self.shared.runtime.note_owner(owner.key(), self.shared.key);
        Ok(self.subscription(SubscriptionKind::Stream(key)))
    }

    /// Remove one subscription
    ///
    /// Unregistering twice, or a handle issued by another manager, is a
    /// no-op that returns `Ok(false)`.
    pub fn unregister(&self, subscription: &Subscription) -> EventResult<bool> {
        let mut state = self.lock_live()?;
        if subscription.manager != self.shared.key {
            return Ok(false);
        }
        let removed = match subscription.kind {
            SubscriptionKind::Subscriber(key) => match state.remove_subscriber(key) {
                Some(subscriber) => {
                    if let Some(id) = subscriber.listener() {
                        if let Some(entry) = state.listeners.get_mut(&id) {
                            entry.subscribers.retain(|k| *k != key);
                        }
                    }
                    true
                }
                None => false,
            },
            SubscriptionKind::Stream(key) => state.stream.remove(key),
        };
        Ok(removed)
    }

    /// Remove everything `owner` registered on this manager
    ///
    /// Returns the number of subscribers and observers removed. A disposed
    /// manager has nothing left to remove.
    pub fn unregister_owner(&self, owner: &Owner) -> usize {
        let mut state = self.shared.state.lock();
        if state.disposed {
            return 0;
        }

        let keys = state.by_owner.remove(&owner.key()).unwrap_or_default();
        let mut removed = 0;
        for key in keys {
            if state.remove_subscriber(key).is_some() {
                removed += 1;
            }
        }
        removed += state.stream.remove_owner(owner.key());
        state.listeners.retain(|_, l| l.owner != owner.key());

        if removed > 0 {
            tracing::debug!(
                "Removed {} subscriptions of '{}' from manager '{}'",
                removed,
                owner.name(),
                self.shared.owner.name()
            );
        }
        removed
    }

    /// Dispose this manager
    ///
    /// Drops every subscriber, observer and listener. Any later use fails
    /// with [`EventError::Disposed`]. Disposing twice is a no-op.
    pub fn dispose(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            for (_, agent) in state.agents.drain() {
                agent.dispose();
            }
            for (_, subscriber) in state.subscribers.drain() {
                subscriber.dispose();
            }
            state.by_owner.clear();
            state.listeners.clear();
            state.stream.clear();
            state.seen.clear();
        }
        self.shared.runtime.forget_manager(self.shared.key);
        tracing::debug!("Disposed event manager '{}'", self.shared.owner.name());
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Dispatch `event` through the parent chain and then this manager
    ///
    /// Returns the same event so callers can inspect its final state
    /// (e.g., whether it ended up cancelled).
    pub fn call<E: Event>(&self, source: Option<&Owner>, event: Arc<E>) -> EventResult<Arc<E>> {
        let shared: SharedEvent = event.clone();
        self.dispatch(source, &shared)?;
        Ok(event)
    }

    /// Type-erased form of [`call`](Self::call)
    pub fn call_shared(&self, source: Option<&Owner>, event: SharedEvent) -> EventResult<SharedEvent> {
        self.dispatch(source, &event)?;
        Ok(event)
    }

    /// Fire `event` on the host bus, then dispatch it here
    ///
    /// Host listeners and canopy subscribers share the event's cancel
    /// cell. Fails with [`EventError::HostUnavailable`] when no host is
    /// attached to the runtime.
    pub fn call_host<E: Event>(&self, source: Option<&Owner>, event: Arc<E>) -> EventResult<Arc<E>> {
        let shared: SharedEvent = event.clone();
        self.call_host_shared(source, shared)?;
        Ok(event)
    }

    /// Type-erased form of [`call_host`](Self::call_host)
    pub fn call_host_shared(
        &self,
        source: Option<&Owner>,
        event: SharedEvent,
    ) -> EventResult<SharedEvent> {
        self.ensure_live()?;
        let host = self
            .shared
            .runtime
            .host()
            .ok_or(EventError::HostUnavailable)?;
        host.bus().call_event(&event)?;
        self.dispatch(source, &event)?;
        Ok(event)
    }

    fn dispatch(&self, source: Option<&Owner>, event: &SharedEvent) -> EventResult<()> {
        let runtime = &self.shared.runtime;
        let now = runtime.scheduler().current_tick();

        if !self.lock_live()?.seen.insert(event, now) {
            tracing::trace!(
                "Manager '{}' already dispatched this {}, skipping",
                self.shared.owner.name(),
                event.name()
            );
            return Ok(());
        }

        if let Some(host) = runtime.host() {
            if !host.is_main_thread() {
                tracing::debug!(
                    "{} dispatched on manager '{}' off the main thread",
                    event.name(),
                    self.shared.owner.name()
                );
            }
        }

        if let Some(parent) = &self.shared.parent {
            if let Err(e) = parent.dispatch(source, event) {
                // Not delivered here either, so a retry must not be dropped
                self.shared.state.lock().seen.remove(event);
                return Err(e);
            }
        }

        // A parent subscriber may have disposed this manager
        let (observers, agent) = {
            let state = self.lock_live()?;
            (
                state.stream.snapshot(),
                state.agents.get(&event.event_type_id()).cloned(),
            )
        };

        stream::publish(&observers, source, event);
        if let Some(agent) = agent {
            agent.call(source, &**event, runtime.settings());
        }
        Ok(())
    }

    /// Drop seen-event entries whose window has passed
    pub(crate) fn sweep_seen(&self, now: u64) {
        let mut state = self.shared.state.lock();
        if !state.disposed {
            state.seen.purge(now);
        }
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    /// Number of live subscribers for event type `E`
    pub fn subscriber_count<E: Event>(&self) -> usize {
        let state = self.shared.state.lock();
        state
            .agents
            .get(&TypeId::of::<E>())
            .map(|agent| agent.len())
            .unwrap_or(0)
    }

    /// Names of the event types that currently have subscribers
    pub fn registered_types(&self) -> Vec<&'static str> {
        let state = self.shared.state.lock();
        let mut names: Vec<&'static str> = state
            .agents
            .values()
            .filter(|agent| agent.len() > 0)
            .map(|agent| agent.event_name())
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of registered listener objects
    pub fn listener_count(&self) -> usize {
        self.shared.state.lock().listeners.len()
    }

    /// Number of call stream observers
    pub fn observer_count(&self) -> usize {
        self.shared.state.lock().stream.len()
    }

    /// Number of event occurrences currently remembered
    pub fn seen_count(&self) -> usize {
        self.shared.state.lock().seen.len()
    }

    /// Whether this manager remembers dispatching `event`
    pub fn has_seen(&self, event: &SharedEvent) -> bool {
        let now = self.shared.runtime.scheduler().current_tick();
        self.shared.state.lock().seen.contains(event, now)
    }
}

impl PartialEq for EventManager {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for EventManager {}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("owner", &self.shared.owner.name())
            .field(
                "parent",
                &self.shared.parent.as_ref().map(|p| p.owner().name()),
            )
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::events::{CancelState, Cancellable, Priority};
    use crate::{Event, EventRuntime};

    #[derive(Event)]
    struct PingEvent;

    #[derive(Event)]
    #[event(category = "player")]
    struct ChatEvent {
        #[event(cancel)]
        cancel: CancelState,
    }

    impl ChatEvent {
        fn new() -> Self {
            Self {
                cancel: CancelState::new(),
            }
        }
    }

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn setup() -> (EventRuntime, Owner) {
        let runtime = EventRuntime::default();
        let owner = runtime.register_owner("test");
        (runtime, owner)
    }

    fn record<E: Event>(
        manager: &EventManager,
        owner: &Owner,
        priority: Priority,
        log: &Log,
        tag: &'static str,
    ) -> Subscription {
        let log = log.clone();
        manager
            .register::<E, _>(owner, SubscribeOptions::with_priority(priority), move |_| {
                log.lock().push(tag)
            })
            .unwrap()
    }

    #[test]
    fn test_root_and_child_ping() {
        let (runtime, owner) = setup();
        let root = runtime.root();
        let child = EventManager::with_parent(&runtime, &owner, Some(root)).unwrap();
        let calls = log();

        record::<PingEvent>(root, &owner, Priority::Normal, &calls, "countR");
        record::<PingEvent>(&child, &owner, Priority::Normal, &calls, "countC");

        child.call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(*calls.lock(), vec!["countR", "countC"]);
    }

    #[test]
    fn test_create_child() {
        let (runtime, owner) = setup();
        let plugin = runtime.create_manager(&owner).unwrap();
        let region = plugin.create_child(&owner).unwrap();
        assert_eq!(region.parent(), Some(&plugin));

        plugin.dispose();
        assert!(matches!(
            plugin.create_child(&owner),
            Err(EventError::Disposed { .. })
        ));
    }

    #[test]
    fn test_parent_chain_runs_root_first() {
        let (runtime, owner) = setup();
        let plugin = EventManager::new(&runtime, &owner).unwrap();
        let region = EventManager::with_parent(&runtime, &owner, Some(&plugin)).unwrap();
        let calls = log();

        // Priorities never reorder across managers
        record::<PingEvent>(&region, &owner, Priority::Lowest, &calls, "region");
        record::<PingEvent>(&plugin, &owner, Priority::Normal, &calls, "plugin");
        record::<PingEvent>(runtime.root(), &owner, Priority::Monitor, &calls, "root");

        region.call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(*calls.lock(), vec!["root", "plugin", "region"]);

        // Calling on the parent does not reach the child
        calls.lock().clear();
        plugin.call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(*calls.lock(), vec!["root", "plugin"]);
    }

    #[test]
    fn test_priority_order_with_stable_ties() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let calls = log();

        record::<PingEvent>(&manager, &owner, Priority::Monitor, &calls, "monitor");
        record::<PingEvent>(&manager, &owner, Priority::Normal, &calls, "normal-1");
        record::<PingEvent>(&manager, &owner, Priority::Lowest, &calls, "lowest");
        record::<PingEvent>(&manager, &owner, Priority::Normal, &calls, "normal-2");
        record::<PingEvent>(&manager, &owner, Priority::High, &calls, "high");

        manager.call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(
            *calls.lock(),
            vec!["lowest", "normal-1", "normal-2", "high", "monitor"]
        );
    }

    /// Registers S1..S4; `s3_uncancels` swaps S3 for one that un-cancels
    fn gating_scenario(s3_uncancels: bool) -> Vec<&'static str> {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let calls = log();

        record::<ChatEvent>(&manager, &owner, Priority::Low, &calls, "S1");

        let s2 = calls.clone();
        manager
            .subscribe::<ChatEvent>(&owner)
            .priority(Priority::Normal)
            .handler(move |chat| {
                s2.lock().push("S2");
                chat.cancel.cancel();
            })
            .unwrap();

        let s3 = calls.clone();
        manager
            .subscribe::<ChatEvent>(&owner)
            .priority(Priority::High)
            .invoked_for_cancelled(true)
            .handler(move |chat| {
                s3.lock().push("S3");
                if s3_uncancels {
                    chat.cancel.set_cancelled(false);
                }
            })
            .unwrap();

        record::<ChatEvent>(&manager, &owner, Priority::Monitor, &calls, "S4");

        manager.call(None, Arc::new(ChatEvent::new())).unwrap();
        let result = calls.lock().clone();
        result
    }

    #[test]
    fn test_cancellation_gating() {
        assert_eq!(gating_scenario(false), vec!["S1", "S2", "S3"]);
    }

    #[test]
    fn test_uncancel_resumes_delivery() {
        assert_eq!(gating_scenario(true), vec!["S1", "S2", "S3", "S4"]);
    }

    #[test]
    fn test_precancelled_event_reaches_only_flagged_subscribers() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let calls = log();

        record::<ChatEvent>(&manager, &owner, Priority::Normal, &calls, "plain");
        let flagged = calls.clone();
        manager
            .register::<ChatEvent, _>(
                &owner,
                SubscribeOptions::new(Priority::Monitor, true),
                move |_| flagged.lock().push("flagged"),
            )
            .unwrap();

        let chat = ChatEvent::new();
        chat.cancel.cancel();
        let chat = manager.call(None, Arc::new(chat)).unwrap();
        assert_eq!(*calls.lock(), vec!["flagged"]);
        assert!(chat.cancel.is_cancelled());
    }

    #[test]
    fn test_failing_subscribers_do_not_abort_dispatch() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let calls = log();

        manager
            .try_register::<PingEvent, _, _>(&owner, SubscribeOptions::default(), |_| {
                Err::<(), _>("nope")
            })
            .unwrap();
        manager
            .register::<PingEvent, _>(&owner, SubscribeOptions::default(), |_| {
                panic!("subscriber bug")
            })
            .unwrap();
        record::<PingEvent>(&manager, &owner, Priority::High, &calls, "after");

        assert!(manager.call(None, Arc::new(PingEvent)).is_ok());
        assert_eq!(*calls.lock(), vec!["after"]);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let other = EventManager::new(&runtime, &owner).unwrap();
        let calls = log();

        let subscription = record::<PingEvent>(&manager, &owner, Priority::Normal, &calls, "ping");
        assert_eq!(manager.subscriber_count::<PingEvent>(), 1);

        // Handles belong to the manager that issued them
        assert!(!other.unregister(&subscription).unwrap());
        assert_eq!(manager.subscriber_count::<PingEvent>(), 1);

        assert!(manager.unregister(&subscription).unwrap());
        assert!(!manager.unregister(&subscription).unwrap());
        assert_eq!(manager.subscriber_count::<PingEvent>(), 0);

        manager.call(None, Arc::new(PingEvent)).unwrap();
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_dispose_blocks_further_use() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let calls = log();
        let subscription = record::<PingEvent>(&manager, &owner, Priority::Normal, &calls, "ping");

        manager.dispose();
        assert!(manager.is_disposed());
        assert_eq!(manager.subscriber_count::<PingEvent>(), 0);

        assert!(matches!(
            manager.call(None, Arc::new(PingEvent)),
            Err(EventError::Disposed { .. })
        ));
        assert!(matches!(
            manager.register::<PingEvent, _>(&owner, SubscribeOptions::default(), |_| {}),
            Err(EventError::Disposed { .. })
        ));
        assert!(matches!(
            manager.unregister(&subscription),
            Err(EventError::Disposed { .. })
        ));
        assert!(matches!(
            manager.on_call(&owner, |_, _| {}),
            Err(EventError::Disposed { .. })
        ));

        // Second dispose is a no-op
        manager.dispose();
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_disposed_parent_fails_child_calls() {
        let (runtime, owner) = setup();
        let parent = EventManager::new(&runtime, &owner).unwrap();
        let child = EventManager::with_parent(&runtime, &owner, Some(&parent)).unwrap();

        parent.dispose();
        let event: SharedEvent = Arc::new(PingEvent);
        assert!(matches!(
            child.call_shared(None, event.clone()),
            Err(EventError::Disposed { owner }) if owner == "test"
        ));
        assert!(!child.has_seen(&event));
        assert_eq!(child.seen_count(), 0);
        assert!(EventManager::with_parent(&runtime, &owner, Some(&parent)).is_err());
    }

    #[test]
    fn test_no_double_dispatch_with_republishing_observer() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        manager
            .register::<PingEvent, _>(&owner, SubscribeOptions::default(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        // A forwarder that synchronously re-publishes everything it sees
        let again = manager.clone();
        manager
            .on_call(&owner, move |source, event| {
                again.call_shared(source, event.clone()).unwrap();
            })
            .unwrap();

        let event = Arc::new(PingEvent);
        manager.call(None, event.clone()).unwrap();
        manager.call(None, event).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_child_republishing_to_parent_is_ignored() {
        let (runtime, owner) = setup();
        let child = EventManager::new(&runtime, &owner).unwrap();
        let calls = log();
        record::<PingEvent>(runtime.root(), &owner, Priority::Normal, &calls, "root");

        let root = runtime.root().clone();
        child
            .on_call(&owner, move |source, event| {
                root.call_shared(source, event.clone()).unwrap();
            })
            .unwrap();

        let event: SharedEvent = Arc::new(PingEvent);
        child.call_shared(None, event.clone()).unwrap();
        assert_eq!(*calls.lock(), vec!["root"]);
        assert!(runtime.root().has_seen(&event));
        assert!(child.has_seen(&event));
    }

    #[test]
    fn test_forwarding_cycle_terminates() {
        let (runtime, owner) = setup();
        let left = EventManager::new(&runtime, &owner).unwrap();
        let right = EventManager::new(&runtime, &owner).unwrap();
        let calls = log();

        record::<PingEvent>(&left, &owner, Priority::Normal, &calls, "left");
        record::<PingEvent>(&right, &owner, Priority::Normal, &calls, "right");

        let to_right = right.clone();
        left.on_call(&owner, move |source, event| {
            to_right.call_shared(source, event.clone()).unwrap();
        })
        .unwrap();
        let to_left = left.clone();
        right
            .on_call(&owner, move |source, event| {
                to_left.call_shared(source, event.clone()).unwrap();
            })
            .unwrap();

        left.call(None, Arc::new(PingEvent)).unwrap();
        let mut seen = calls.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec!["left", "right"]);
    }

    #[test]
    fn test_distinct_events_both_dispatched() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let calls = log();
        record::<PingEvent>(&manager, &owner, Priority::Normal, &calls, "ping");

        manager.call(None, Arc::new(PingEvent)).unwrap();
        manager.call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(calls.lock().len(), 2);
    }

    #[test]
    fn test_snapshot_semantics_during_dispatch() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let calls = log();

        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let remover_manager = manager.clone();
        let remover_victim = victim.clone();
        let remover_owner = owner.clone();
        let remover_calls = calls.clone();
        manager
            .register::<PingEvent, _>(&owner, SubscribeOptions::with_priority(Priority::Low), move |_| {
                remover_calls.lock().push("remover");
                if let Some(subscription) = remover_victim.lock().take() {
                    remover_manager.unregister(&subscription).unwrap();
                }
                // Registered mid-dispatch: only runs on the next call
                let late_calls = remover_calls.clone();
                remover_manager
                    .register::<PingEvent, _>(&remover_owner, SubscribeOptions::default(), move |_| {
                        late_calls.lock().push("late")
                    })
                    .unwrap();
            })
            .unwrap();
        *victim.lock() = Some(record::<PingEvent>(
            &manager,
            &owner,
            Priority::High,
            &calls,
            "victim",
        ));

        manager.call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(*calls.lock(), vec!["remover", "victim"]);

        calls.lock().clear();
        manager.call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(*calls.lock(), vec!["remover", "late"]);
    }

    #[test]
    fn test_register_from_another_thread_during_dispatch() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let worker = {
            let manager = manager.clone();
            let owner = owner.clone();
            let hits = hits.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let counted = hits.clone();
                    let subscription = manager
                        .register::<PingEvent, _>(&owner, SubscribeOptions::default(), move |_| {
                            counted.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                    manager.unregister(&subscription).unwrap();
                }
                let counted = hits.clone();
                manager
                    .register::<PingEvent, _>(&owner, SubscribeOptions::default(), move |_| {
                        counted.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            })
        };

        for _ in 0..200 {
            manager.call(None, Arc::new(PingEvent)).unwrap();
        }
        worker.join().unwrap();

        assert_eq!(manager.subscriber_count::<PingEvent>(), 1);
        let before = hits.load(Ordering::SeqCst);
        manager.call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_inactive_owner_rejected() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let retired = runtime.register_owner("retired");
        runtime.disable_owner(&retired);

        assert!(matches!(
            manager.register::<PingEvent, _>(&retired, SubscribeOptions::default(), |_| {}),
            Err(EventError::InactiveOwner(name)) if name == "retired"
        ));
        assert!(EventManager::new(&runtime, &retired).is_err());
        assert_eq!(manager.subscriber_count::<PingEvent>(), 0);
    }

    #[test]
    fn test_unregister_owner_is_local() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let guest = runtime.register_owner("guest");
        let calls = log();

        record::<PingEvent>(&manager, &owner, Priority::Normal, &calls, "host");
        record::<PingEvent>(&manager, &guest, Priority::Normal, &calls, "guest");
        record::<ChatEvent>(&manager, &guest, Priority::Normal, &calls, "guest-chat");
        manager.on_call(&guest, |_, _| {}).unwrap();

        assert_eq!(manager.unregister_owner(&guest), 3);
        assert_eq!(manager.unregister_owner(&guest), 0);
        assert_eq!(manager.observer_count(), 0);

        manager.call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(*calls.lock(), vec!["host"]);
    }

    #[test]
    fn test_call_stream_sees_every_type() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let names = Arc::new(Mutex::new(Vec::new()));

        let seen = names.clone();
        let subscription = manager
            .on_call(&owner, move |source, event| {
                seen.lock().push((source.map(|o| o.name().to_string()), event.name()));
            })
            .unwrap();

        manager.call(Some(&owner), Arc::new(PingEvent)).unwrap();
        manager.call(None, Arc::new(ChatEvent::new())).unwrap();

        let names_now = names.lock().clone();
        assert_eq!(names_now.len(), 2);
        assert_eq!(names_now[0].0.as_deref(), Some("test"));
        assert!(names_now[0].1.ends_with("PingEvent"));
        assert!(names_now[1].1.ends_with("ChatEvent"));

        assert!(manager.unregister(&subscription).unwrap());
        manager.call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(names.lock().len(), 2);
    }

    #[test]
    fn test_introspection() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        assert_eq!(manager.owner(), &owner);
        assert_eq!(manager.parent(), Some(runtime.root()));
        assert!(runtime.root().parent().is_none());
        assert!(manager.registered_types().is_empty());

        let calls = log();
        record::<PingEvent>(&manager, &owner, Priority::Normal, &calls, "a");
        record::<PingEvent>(&manager, &owner, Priority::Normal, &calls, "b");
        let chat = record::<ChatEvent>(&manager, &owner, Priority::Normal, &calls, "c");

        assert_eq!(manager.subscriber_count::<PingEvent>(), 2);
        assert_eq!(manager.registered_types().len(), 2);

        manager.unregister(&chat).unwrap();
        let types = manager.registered_types();
        assert_eq!(types.len(), 1);
        assert!(types[0].ends_with("PingEvent"));
    }

    #[test]
    fn test_call_without_subscribers_returns_event() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        let chat = Arc::new(ChatEvent::new());
        let returned = manager.call(None, chat.clone()).unwrap();
        assert!(Arc::ptr_eq(&chat, &returned));
        assert!(!returned.cancel.is_cancelled());
    }

    #[test]
    fn test_call_host_without_host() {
        let (runtime, owner) = setup();
        let manager = EventManager::new(&runtime, &owner).unwrap();
        assert!(matches!(
            manager.call_host(None, Arc::new(PingEvent)),
            Err(EventError::HostUnavailable)
        ));
    }
}
