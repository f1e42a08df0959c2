//! # Plugin Lifecycle Example
//!
//! A plugin that loads its settings, greets players from a subscriber,
//! announces on an owner-bound timer, and is torn down completely when
//! the runtime publishes an `OwnerDisableEvent` for it.
//!
//! ## Features Demonstrated
//! - `PluginConfig` - TOML settings under `configs/plugins/<name>/`
//! - `Scheduler::schedule` - Timers bound to the plugin owner
//! - `EventRuntime::install_owner_teardown` - Teardown by event
//! - `SubscriberBuilder` - Fluent subscription
//!
//! ## Usage
//! ```ignore
//! let runtime = EventRuntime::default();
//! runtime.install_owner_teardown()?;
//! let plugin = Announcer::enable(&runtime, AnnouncerSettings::load()?)?;
//! // ... later
//! plugin.disable(&runtime)?;
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use canopy_core::{
    Event, EventManager, EventResult, EventRuntime, Owner, OwnerDisableEvent, PluginConfig,
    Priority, TimerFlags,
};

/// Settings file for the announcer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncerSettings {
    /// Ticks between announcements
    pub interval_ticks: u64,
    pub message: String,
    pub greeting: String,
}

impl Default for AnnouncerSettings {
    fn default() -> Self {
        Self {
            interval_ticks: 20,
            message: "Be nice to each other".to_string(),
            greeting: "Welcome".to_string(),
        }
    }
}

impl PluginConfig for AnnouncerSettings {
    const PLUGIN_NAME: &'static str = "announcer";
}

/// A player finished joining
#[derive(Event)]
#[event(category = "player")]
pub struct PlayerJoin {
    pub name: String,
}

pub struct Announcer {
    owner: Owner,
    manager: EventManager,
    /// Everything the plugin "said", in order
    output: Arc<Mutex<Vec<String>>>,
}

impl Announcer {
    /// Register the plugin's subscriber and timer
    pub fn enable(runtime: &EventRuntime, settings: AnnouncerSettings) -> EventResult<Self> {
        let owner = runtime.register_owner(AnnouncerSettings::PLUGIN_NAME);
        let manager = runtime.create_manager(&owner)?;
        let output = Arc::new(Mutex::new(Vec::new()));

        let greetings = output.clone();
        let greeting = settings.greeting.clone();
        manager
            .subscribe::<PlayerJoin>(&owner)
            .priority(Priority::Monitor)
            .handler(move |join| {
                greetings.lock().push(format!("{}, {}!", greeting, join.name));
            })?;

        let announcements = output.clone();
        let message = settings.message;
        runtime.scheduler().schedule(
            settings.interval_ticks,
            TimerFlags::REPEAT | TimerFlags::STOP_ON_OWNER_DISABLE,
            Some(&owner),
            move || announcements.lock().push(message.clone()),
        );

        tracing::info!(
            "Announcer enabled (every {} ticks)",
            settings.interval_ticks
        );
        Ok(Self {
            owner,
            manager,
            output,
        })
    }

    pub fn manager(&self) -> &EventManager {
        &self.manager
    }

    pub fn output(&self) -> Vec<String> {
        self.output.lock().clone()
    }

    /// Publish the disable event; the runtime does the rest
    pub fn disable(&self, runtime: &EventRuntime) -> EventResult<()> {
        runtime.root().call(
            Some(runtime.runtime_owner()),
            Arc::new(OwnerDisableEvent {
                owner: self.owner.clone(),
            }),
        )?;
        tracing::info!("Announcer disabled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> EventRuntime {
        let runtime = EventRuntime::default();
        runtime.install_owner_teardown().unwrap();
        runtime
    }

    fn settings() -> AnnouncerSettings {
        AnnouncerSettings {
            interval_ticks: 2,
            ..AnnouncerSettings::default()
        }
    }

    #[test]
    fn test_greets_and_announces() {
        let runtime = runtime();
        let plugin = Announcer::enable(&runtime, settings()).unwrap();

        plugin
            .manager()
            .call(None, Arc::new(PlayerJoin { name: "alex".into() }))
            .unwrap();
        runtime.tick();
        runtime.tick();

        assert_eq!(
            plugin.output(),
            vec!["Welcome, alex!".to_string(), "Be nice to each other".to_string()]
        );
    }

    #[test]
    fn test_disable_tears_down_everything() {
        let runtime = runtime();
        let plugin = Announcer::enable(&runtime, settings()).unwrap();
        assert_eq!(runtime.scheduler().timer_count(), 1);

        plugin.disable(&runtime).unwrap();
        assert!(plugin.manager().is_disposed());
        assert_eq!(runtime.scheduler().timer_count(), 0);

        for _ in 0..4 {
            runtime.tick();
        }
        assert!(plugin.output().is_empty());
        assert!(plugin
            .manager()
            .call(None, Arc::new(PlayerJoin { name: "late".into() }))
            .is_err());
    }

    #[test]
    fn test_settings_from_toml() {
        let settings: AnnouncerSettings = toml::from_str("interval_ticks = 5").unwrap();
        assert_eq!(settings.interval_ticks, 5);
        assert_eq!(settings.greeting, "Welcome");
    }
}
