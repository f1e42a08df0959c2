//! canopy - core runtime
//!
//! Hierarchical event managers for game-server plugins. Each plugin (or
//! sub-context such as a region) gets its own [`EventManager`] in a tree
//! below the runtime's root; events called on a manager are seen by every
//! ancestor first, each manager delivers a given occurrence at most once,
//! and everything an owner registered can be torn down in one call.
//!
//! # Re-exports
//!
//! This crate re-exports the SDK and engine crates for convenience:
//! - [`sdk`] - event model types plugins compile against
//! - [`engine`] - host bus interfaces and the loopback bus

// Allow the crate to refer to itself as `canopy_core` for proc macro compatibility
extern crate self as canopy_core;

pub use canopy_engine as engine;
pub use canopy_sdk as sdk;

pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod runtime;
pub mod scheduler;

// Re-export commonly used items
pub use bridge::{CategoryDispatcher, CategoryHooks, HostForwarder};
pub use config::{ConfigError, ConfigResult, CoreConfig, EventsConfig, PluginConfig};
pub use error::{BoxError, EventError, EventResult, SubscriberError};
pub use events::{
    CancelState, Cancellable, Event, EventCategory, EventManager, Listener, ListenerRegistrar,
    Owner, Priority, SharedEvent, SubscribeOptions, Subscription,
};
pub use runtime::{EventRuntime, OwnerDisableEvent};
pub use scheduler::{QueueError, Scheduler, TimerFlags, TimerKey};

// Re-export macros
pub use canopy_macros::{event_listener, Event};
