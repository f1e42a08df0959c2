//! canopy SDK - Event Vocabulary Types
//!
//! This crate contains the types every plugin and the runtime agree on:
//! the [`Event`] trait, cancellation, priorities and categories.
//! It has no dependencies and compiles quickly, so plugin crates can
//! depend on it without pulling in the dispatch runtime.
//!
//! # Modules
//!
//! - [`event`] - The `Event` trait and shared event handles
//! - [`cancel`] - Cancellation capability and the shared cancel cell
//! - [`priority`] - Subscriber priorities
//! - [`category`] - Host event categories used by the bridge

pub mod cancel;
pub mod category;
pub mod event;
pub mod priority;

pub use cancel::{CancelState, Cancellable};
pub use category::EventCategory;
pub use event::{AsAny, Event, SharedEvent};
pub use priority::{ParsePriorityError, Priority};
