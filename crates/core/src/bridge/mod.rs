//! Host bridge
//!
//! Connects the manager tree to the host's native event bus.
//!
//! - Inbound: [`HostForwarder`] registers on the native bus and republishes
//!   each host event into a manager, routing it through [`CategoryHooks`].
//! - Outbound: [`EventManager::call_host`](crate::events::EventManager::call_host)
//!   fires on the native bus first; [`CategoryDispatcher`] routes every call
//!   on a manager to category hooks.

mod category;
mod forwarder;

pub use category::{route, CategoryDispatcher, CategoryHooks, NoHooks};
pub use forwarder::HostForwarder;
