//! Event runtime
//!
//! Owns the root manager, the owner registry, the tick scheduler and the
//! (optional) host context. Plugins receive a reference to the runtime
//! instead of reaching for process-wide statics.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use slotmap::SlotMap;

use canopy_engine::HostContext;
use canopy_sdk::Event;

use crate::config::{CoreConfig, EventsConfig};
use crate::error::{EventError, EventResult};
use crate::events::{
    DispatchSettings, EventManager, ManagerKey, ManagerShared, Owner, OwnerKey, SubscribeOptions,
    Subscription,
};
use crate::scheduler::Scheduler;

/// Name of the owner that holds the root manager
pub const RUNTIME_OWNER: &str = "canopy";

/// Published (on the root manager) when a plugin is being disabled
///
/// After [`EventRuntime::install_owner_teardown`], calling this event
/// tears down everything the owner registered.
#[derive(Debug, Clone)]
pub struct OwnerDisableEvent {
    pub owner: Owner,
}

impl Event for OwnerDisableEvent {}

struct ManagerRecord {
    owner: OwnerKey,
    handle: Weak<ManagerShared>,
}

struct RuntimeState {
    owners: SlotMap<OwnerKey, Owner>,
    managers: SlotMap<ManagerKey, ManagerRecord>,
    /// Managers each owner has registered something on
    owner_index: HashMap<OwnerKey, HashSet<ManagerKey>>,
}

pub(crate) struct RuntimeShared {
    settings: DispatchSettings,
    dedup_window: u64,
    scheduler: Scheduler,
    host: RwLock<Option<HostContext>>,
    state: Mutex<RuntimeState>,
}

impl RuntimeShared {
    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn dedup_window(&self) -> u64 {
        self.dedup_window
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn host(&self) -> Option<HostContext> {
        self.host.read().clone()
    }

    fn register_owner(&self, name: &str) -> Owner {
        let owner = {
            let mut state = self.state.lock();
            let key = state.owners.insert_with_key(|key| Owner::new(key, name));
            state.owners[key].clone()
        };
        tracing::debug!("Registered owner '{}'", owner.name());
        owner
    }

    pub fn create_manager(
        self: &Arc<Self>,
        owner: &Owner,
        parent: Option<EventManager>,
    ) -> EventResult<EventManager> {
        if !owner.is_active() {
            return Err(EventError::InactiveOwner(owner.name().to_string()));
        }

        let parent_name = parent.as_ref().map(|p| p.owner().name().to_string());
        let manager = self.insert_manager(owner, parent);

        tracing::debug!(
            "Created event manager for '{}' (parent: {})",
            owner.name(),
            parent_name.as_deref().unwrap_or("none")
        );
        Ok(manager)
    }

    fn insert_manager(self: &Arc<Self>, owner: &Owner, parent: Option<EventManager>) -> EventManager {
        let mut state = self.state.lock();
        let key = state.managers.insert(ManagerRecord {
            owner: owner.key(),
            handle: Weak::new(),
        });
        let manager = EventManager::build(key, owner.clone(), parent, self.clone());
        state.managers[key].handle = manager.downgrade();
        manager
    }

    /// Record that `owner` registered something on `manager`
    pub fn note_owner(&self, owner: OwnerKey, manager: ManagerKey) {
        self.state
            .lock()
            .owner_index
            .entry(owner)
            .or_default()
            .insert(manager);
    }

    pub fn forget_manager(&self, key: ManagerKey) {
        let mut state = self.state.lock();
        state.managers.remove(key);
        state.owner_index.retain(|_, managers| {
            managers.remove(&key);
            !managers.is_empty()
        });
    }

    /// Managers indexed for `owner`
    #[cfg(test)]
    fn indexed_managers(&self, owner: OwnerKey) -> usize {
        self.state
            .lock()
            .owner_index
            .get(&owner)
            .map_or(0, HashSet::len)
    }

    /// Live managers; records of managers dropped without dispose are pruned
    fn live_managers(&self) -> Vec<EventManager> {
        let mut state = self.state.lock();
        let mut dead = HashSet::new();
        state.managers.retain(|key, record| {
            let alive = record.handle.strong_count() > 0;
            if !alive {
                dead.insert(key);
            }
            alive
        });
        if !dead.is_empty() {
            state.owner_index.retain(|_, managers| {
                managers.retain(|key| !dead.contains(key));
                !managers.is_empty()
            });
            tracing::trace!("Pruned {} dropped managers", dead.len());
        }
        state
            .managers
            .values()
            .filter_map(|record| record.handle.upgrade())
            .map(EventManager::from_shared)
            .collect()
    }

    fn unregister_owner(&self, owner: &Owner) -> usize {
        // Collect first; managers take their own lock
        let managers: Vec<EventManager> = {
            let mut state = self.state.lock();
            let keys = state.owner_index.remove(&owner.key()).unwrap_or_default();
            keys.into_iter()
                .filter_map(|key| state.managers.get(key))
                .filter_map(|record| record.handle.upgrade())
                .map(EventManager::from_shared)
                .collect()
        };

        let removed: usize = managers.iter().map(|m| m.unregister_owner(owner)).sum();
        tracing::info!(
            "Unregistered owner '{}' ({} subscriptions across {} managers)",
            owner.name(),
            removed,
            managers.len()
        );
        removed
    }

    fn disable_owner(&self, owner: &Owner) -> usize {
        owner.deactivate();
        let removed = self.unregister_owner(owner);

        let owned: Vec<EventManager> = {
            let state = self.state.lock();
            state
                .managers
                .values()
                .filter(|record| record.owner == owner.key())
                .filter_map(|record| record.handle.upgrade())
                .map(EventManager::from_shared)
                .collect()
        };
        for manager in &owned {
            manager.dispose();
        }

        let timers = self.scheduler.cancel_owner_timers(owner.key());
        self.state.lock().owners.remove(owner.key());

        tracing::info!(
            "Disabled owner '{}' ({} managers disposed, {} timers cancelled)",
            owner.name(),
            owned.len(),
            timers
        );
        removed
    }
}

/// The event runtime
///
/// Create one per host process during plugin load and drive it by calling
/// [`tick`](Self::tick) once per server tick.
pub struct EventRuntime {
    shared: Arc<RuntimeShared>,
    root: EventManager,
}

impl Default for EventRuntime {
    fn default() -> Self {
        Self::new(&EventsConfig::default())
    }
}

impl EventRuntime {
    /// Create a runtime with the given event tuning
    pub fn new(config: &EventsConfig) -> Self {
        let shared = Arc::new(RuntimeShared {
            settings: config.dispatch_settings(),
            dedup_window: config.dedup_window(),
            scheduler: Scheduler::new(),
            host: RwLock::new(None),
            state: Mutex::new(RuntimeState {
                owners: SlotMap::with_key(),
                managers: SlotMap::with_key(),
                owner_index: HashMap::new(),
            }),
        });

        let runtime_owner = shared.register_owner(RUNTIME_OWNER);
        let root = shared.insert_manager(&runtime_owner, None);

        tracing::info!(
            "Event runtime started (dedup window {} ticks)",
            shared.dedup_window
        );
        Self { shared, root }
    }

    /// Create a runtime from the core config
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(&config.events)
    }

    pub(crate) fn shared(&self) -> &Arc<RuntimeShared> {
        &self.shared
    }

    /// The root of the manager tree
    pub fn root(&self) -> &EventManager {
        &self.root
    }

    /// Owner of the root manager
    pub fn runtime_owner(&self) -> &Owner {
        self.root.owner()
    }

    /// Register a new owner (typically one per plugin)
    pub fn register_owner(&self, name: &str) -> Owner {
        self.shared.register_owner(name)
    }

    /// Look up a live owner by name
    pub fn owner(&self, name: &str) -> Option<Owner> {
        self.shared
            .state
            .lock()
            .owners
            .values()
            .find(|owner| owner.name() == name)
            .cloned()
    }

    /// Create a child of the root manager
    pub fn create_manager(&self, owner: &Owner) -> EventResult<EventManager> {
        EventManager::new(self, owner)
    }

    /// Remove everything `owner` registered, on every manager
    ///
    /// Returns the number of subscriptions removed. The owner stays active.
    pub fn unregister_owner(&self, owner: &Owner) -> usize {
        self.shared.unregister_owner(owner)
    }

    /// Tear down an owner
    ///
    /// Unregisters its subscriptions everywhere, disposes the managers it
    /// owns, cancels its owner-bound timers and marks it inactive so later
    /// registrations fail.
    pub fn disable_owner(&self, owner: &Owner) -> usize {
        self.shared.disable_owner(owner)
    }

    /// Subscribe the root manager to [`OwnerDisableEvent`]
    ///
    /// The subscriber runs at monitor priority so the rest of the tree sees
    /// the event before the owner is torn down.
    pub fn install_owner_teardown(&self) -> EventResult<Subscription> {
        let shared = Arc::downgrade(&self.shared);
        self.root.register::<OwnerDisableEvent, _>(
            self.root.owner(),
            SubscribeOptions::new(canopy_sdk::Priority::Monitor, true),
            move |event| {
                if let Some(shared) = shared.upgrade() {
                    shared.disable_owner(&event.owner);
                }
            },
        )
    }

    /// Attach the host context; events can then go through the host bus
    pub fn attach_host(&self, host: HostContext) {
        tracing::info!("Host attached (main thread {:?})", host.main_thread_id());
        *self.shared.host.write() = Some(host);
    }

    /// Detach the host context, returning it
    pub fn detach_host(&self) -> Option<HostContext> {
        self.shared.host.write().take()
    }

    /// The attached host context, if any
    pub fn host(&self) -> Option<HostContext> {
        self.shared.host()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.shared.scheduler
    }

    pub fn current_tick(&self) -> u64 {
        self.shared.scheduler.current_tick()
    }

    /// Advance one tick
    ///
    /// Runs queued tasks and due timers, then expires seen-event entries on
    /// every live manager. Returns the new tick number.
    pub fn tick(&self) -> u64 {
        let now = self.shared.scheduler.tick();
        for manager in self.shared.live_managers() {
            manager.sweep_seen(now);
        }
        now
    }

    /// Number of live (not disposed) managers, root included
    pub fn manager_count(&self) -> usize {
        self.shared.live_managers().len()
    }

    /// Dispose every manager and drop all timers and tasks
    pub fn shutdown(&self) {
        for manager in self.shared.live_managers() {
            manager.dispose();
        }
        self.shared.scheduler.clear();
        self.detach_host();
        tracing::info!("Event runtime shut down");
    }
}

impl std::fmt::Debug for EventRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRuntime")
            .field("tick", &self.current_tick())
            .field("managers", &self.manager_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use canopy_engine::{HostEventBus, HostEventKind, LoopbackBus};
    use canopy_sdk::{CancelState, Cancellable, Priority, SharedEvent};

    use crate::scheduler::TimerFlags;

    struct PingEvent;

    impl Event for PingEvent {}

    struct BlockBreak {
        cancel: CancelState,
    }

    impl Event for BlockBreak {
        fn cancellable(&self) -> Option<&dyn Cancellable> {
            Some(&self.cancel)
        }
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn count_pings(manager: &EventManager, owner: &Owner, hits: &Arc<AtomicUsize>) -> Subscription {
        let hits = hits.clone();
        manager
            .register::<PingEvent, _>(owner, SubscribeOptions::default(), move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
    }

    #[test]
    fn test_root_is_live_and_owned_by_runtime() {
        let runtime = EventRuntime::default();
        assert_eq!(runtime.runtime_owner().name(), RUNTIME_OWNER);
        assert!(runtime.root().parent().is_none());
        assert_eq!(runtime.manager_count(), 1);
        assert_eq!(runtime.owner(RUNTIME_OWNER).as_ref(), Some(runtime.runtime_owner()));
    }

    #[test]
    fn test_seen_entries_expire_after_window() {
        let runtime = EventRuntime::default();
        let owner = runtime.register_owner("plugin");
        let manager = runtime.create_manager(&owner).unwrap();
        let hits = counter();
        count_pings(&manager, &owner, &hits);

        let event: SharedEvent = Arc::new(PingEvent);
        manager.call_shared(None, event.clone()).unwrap();
        assert!(manager.has_seen(&event));
        assert!(runtime.root().has_seen(&event));

        runtime.tick();
        manager.call_shared(None, event.clone()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        runtime.tick();
        assert!(!manager.has_seen(&event));
        assert_eq!(manager.seen_count(), 0);

        // Once forgotten, the same occurrence is delivered again
        manager.call_shared(None, event).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_custom_dedup_window() {
        let config = EventsConfig {
            dedup_window_ticks: 5,
            ..EventsConfig::default()
        };
        let runtime = EventRuntime::new(&config);
        let event: SharedEvent = Arc::new(PingEvent);
        runtime.root().call_shared(None, event.clone()).unwrap();

        for _ in 0..4 {
            runtime.tick();
        }
        assert!(runtime.root().has_seen(&event));
        runtime.tick();
        assert!(!runtime.root().has_seen(&event));
    }

    #[test]
    fn test_unregister_owner_across_managers() {
        let runtime = EventRuntime::default();
        let plugin = runtime.register_owner("plugin");
        let guest = runtime.register_owner("guest");
        let manager = runtime.create_manager(&plugin).unwrap();
        let hits = counter();

        count_pings(runtime.root(), &guest, &hits);
        count_pings(&manager, &guest, &hits);
        count_pings(&manager, &plugin, &hits);
        manager.on_call(&guest, |_, _| {}).unwrap();

        assert_eq!(runtime.unregister_owner(&guest), 3);
        assert!(guest.is_active());

        manager.call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Still allowed to register afterwards
        count_pings(&manager, &guest, &hits);
    }

    #[test]
    fn test_disable_owner_tears_everything_down() {
        let runtime = EventRuntime::default();
        let plugin = runtime.register_owner("plugin");
        let manager = runtime.create_manager(&plugin).unwrap();
        let region = EventManager::with_parent(&runtime, &plugin, Some(&manager)).unwrap();
        let hits = counter();
        count_pings(runtime.root(), &plugin, &hits);

        let fired = counter();
        let bound = fired.clone();
        runtime.scheduler().schedule(
            1,
            TimerFlags::REPEAT | TimerFlags::STOP_ON_OWNER_DISABLE,
            Some(&plugin),
            move || {
                bound.fetch_add(1, Ordering::SeqCst);
            },
        );
        let unbound = fired.clone();
        runtime.scheduler().run_repeating(1, move || {
            unbound.fetch_add(100, Ordering::SeqCst);
        });

        assert_eq!(runtime.manager_count(), 3);
        assert_eq!(runtime.disable_owner(&plugin), 1);

        assert!(!plugin.is_active());
        assert!(manager.is_disposed());
        assert!(region.is_disposed());
        assert_eq!(runtime.manager_count(), 1);
        assert!(runtime.owner("plugin").is_none());

        runtime.tick();
        assert_eq!(fired.load(Ordering::SeqCst), 100);
        assert_eq!(runtime.scheduler().timer_count(), 1);

        assert!(matches!(
            runtime.create_manager(&plugin),
            Err(EventError::InactiveOwner(_))
        ));
        runtime.root().call(None, Arc::new(PingEvent)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_owner_disable_event_triggers_teardown() {
        let runtime = EventRuntime::default();
        runtime.install_owner_teardown().unwrap();

        let plugin = runtime.register_owner("plugin");
        let manager = runtime.create_manager(&plugin).unwrap();
        let saw_disable = counter();

        // Subscribers below the root still see the event before teardown
        let seen = saw_disable.clone();
        runtime
            .root()
            .register::<OwnerDisableEvent, _>(
                &plugin,
                SubscribeOptions::with_priority(Priority::Highest),
                move |event| {
                    assert!(event.owner.is_active());
                    seen.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();

        runtime
            .root()
            .call(
                Some(runtime.runtime_owner()),
                Arc::new(OwnerDisableEvent {
                    owner: plugin.clone(),
                }),
            )
            .unwrap();

        assert_eq!(saw_disable.load(Ordering::SeqCst), 1);
        assert!(!plugin.is_active());
        assert!(manager.is_disposed());
        assert_eq!(runtime.root().subscriber_count::<OwnerDisableEvent>(), 1);
    }

    #[test]
    fn test_call_host_requires_host() {
        let runtime = EventRuntime::default();
        assert!(runtime.host().is_none());
        assert!(matches!(
            runtime.root().call_host(None, Arc::new(PingEvent)),
            Err(EventError::HostUnavailable)
        ));
    }

    #[test]
    fn test_call_host_shares_cancel_cell() {
        let runtime = EventRuntime::default();
        let bus = Arc::new(LoopbackBus::new());
        runtime.attach_host(HostContext::new(bus.clone()));

        let owner = runtime.register_owner("protect");
        let manager = runtime.create_manager(&owner).unwrap();

        // A native listener cancels; canopy subscribers observe it
        bus.register_event(
            bus.allocate_listener(),
            HostEventKind::of::<BlockBreak>(),
            Priority::Normal,
            Arc::new(|event: &SharedEvent| {
                if let Some(cancel) = event.cancellable() {
                    cancel.cancel();
                }
            }),
        )
        .unwrap();

        let plain = counter();
        let hits = plain.clone();
        manager
            .register::<BlockBreak, _>(&owner, SubscribeOptions::default(), move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        manager
            .register::<BlockBreak, _>(
                &owner,
                SubscribeOptions::new(Priority::Monitor, true),
                |event| event.cancel.set_cancelled(false),
            )
            .unwrap();

        let event = manager
            .call_host(
                None,
                Arc::new(BlockBreak {
                    cancel: CancelState::new(),
                }),
            )
            .unwrap();

        assert_eq!(bus.fired_count(), 1);
        assert_eq!(plain.load(Ordering::SeqCst), 0);
        assert!(!event.cancel.is_cancelled());
    }

    #[test]
    fn test_shutdown_disposes_everything() {
        let runtime = EventRuntime::default();
        runtime.attach_host(HostContext::new(Arc::new(LoopbackBus::new())));
        let owner = runtime.register_owner("plugin");
        let manager = runtime.create_manager(&owner).unwrap();
        runtime.scheduler().run_later(10, || {});

        runtime.shutdown();

        assert!(manager.is_disposed());
        assert!(runtime.root().is_disposed());
        assert_eq!(runtime.manager_count(), 0);
        assert_eq!(runtime.scheduler().timer_count(), 0);
        assert!(runtime.host().is_none());
    }

    #[test]
    fn test_dropped_managers_leave_owner_index() {
        let runtime = EventRuntime::default();
        let sessions = runtime.register_owner("sessions");
        let hits = counter();
        for _ in 0..100 {
            let manager = runtime.create_manager(&sessions).unwrap();
            count_pings(&manager, &sessions, &hits);
        }
        let kept = runtime.create_manager(&sessions).unwrap();
        count_pings(&kept, &sessions, &hits);
        assert_eq!(runtime.shared.indexed_managers(sessions.key()), 101);

        runtime.tick();
        assert_eq!(runtime.manager_count(), 2);
        assert_eq!(runtime.shared.indexed_managers(sessions.key()), 1);

        kept.dispose();
        assert_eq!(runtime.shared.indexed_managers(sessions.key()), 0);
        assert_eq!(runtime.unregister_owner(&sessions), 0);
    }

    #[test]
    fn test_dropped_managers_are_pruned() {
        let runtime = EventRuntime::default();
        let owner = runtime.register_owner("plugin");
        {
            let _manager = runtime.create_manager(&owner).unwrap();
            assert_eq!(runtime.manager_count(), 2);
        }
        assert_eq!(runtime.manager_count(), 1);
        assert_eq!(runtime.tick(), 1);
    }
}
