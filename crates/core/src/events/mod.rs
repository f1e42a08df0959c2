//! Hierarchical event system
//!
//! Plugins and sub-contexts get their own [`EventManager`], arranged in a
//! tree below the runtime's root manager. Calling an event on a manager
//! dispatches it down the whole path from the root, so contexts observe
//! everything their ancestors see.
//!
//! # Architecture
//!
//! ```text
//! host bus ──HostForwarder──▶ root ──▶ plugin manager ──▶ region manager
//!                               │            │                  │
//!                          call stream   agents (per type) ─▶ subscribers
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use canopy_core::events::{CancelState, Cancellable, EventManager, Priority};
//! use canopy_core::{Event, EventRuntime};
//!
//! #[derive(Event)]
//! #[event(category = "player")]
//! struct PlayerChat {
//!     message: String,
//!     #[event(cancel)]
//!     cancel: CancelState,
//! }
//!
//! let runtime = EventRuntime::default();
//! let owner = runtime.register_owner("chat-filter");
//! let manager = EventManager::new(&runtime, &owner).unwrap();
//!
//! manager
//!     .subscribe::<PlayerChat>(&owner)
//!     .priority(Priority::Low)
//!     .handler(|chat| {
//!         if chat.message.contains("spam") {
//!             chat.cancel.set_cancelled(true);
//!         }
//!     })
//!     .unwrap();
//!
//! let chat = manager
//!     .call(None, Arc::new(PlayerChat { message: "spam".into(), cancel: CancelState::new() }))
//!     .unwrap();
//! assert!(chat.cancel.is_cancelled());
//! ```

mod agent;
mod builder;
mod dedup;
mod listener;
mod manager;
mod owner;
mod registry;
mod stream;
mod subscriber;

pub use agent::DispatchSettings;
pub use builder::SubscriberBuilder;
pub use listener::{Listener, ListenerRegistrar};
pub use manager::{EventManager, ManagerKey, Subscription, SubscriptionKind};
pub use owner::{Owner, OwnerKey};
pub use stream::{StreamCallback, StreamKey};
pub use subscriber::{SubscribeOptions, Subscriber, SubscriberKey};

pub(crate) use manager::ManagerShared;

// Event model types live in the SDK crate
pub use canopy_sdk::{
    AsAny, CancelState, Cancellable, Event, EventCategory, Priority, SharedEvent,
};

pub use crate::error::BoxError;
