//! canopy Engine - Host Runtime Interfaces
//!
//! This crate describes what canopy consumes from the game server it runs in:
//! - The host's native event bus ([`HostEventBus`])
//! - The identity of the host's main thread ([`HostContext`])
//!
//! It also ships [`LoopbackBus`], an in-process implementation of the native
//! bus used by tests, demos and hosts without an event bus of their own.
//!
//! # Architecture
//!
//! The host creates a [`HostContext`] once during startup and attaches it to
//! the event runtime. The runtime never reaches for global state; everything
//! host-related flows through the attached context.
//!
//! # Thread Safety
//!
//! Game state is mutated on the host's main thread. The main thread ID is
//! captured when the context is created, for runtime checks via
//! [`HostContext::is_main_thread`].

pub mod bus;
pub mod context;
pub mod error;
pub mod loopback;

pub use bus::{HostEventBus, HostEventKind, HostExecutor, HostListenerId};
pub use context::HostContext;
pub use error::HostError;
pub use loopback::LoopbackBus;
