//! canopy proc macros
//!
//! This crate provides proc macros for the canopy framework:
//!
//! - `#[derive(Event)]` - Implement the `Event` trait for a struct
//! - `#[event_listener]` - Turn `#[subscribe]` methods into a `Listener`
//!
//! # Event Example
//!
//! ```ignore
//! use canopy_core::{CancelState, Event};
//!
//! #[derive(Event)]
//! #[event(category = "player")]
//! pub struct PlayerChat {
//!     pub message: String,
//!
//!     #[event(cancel)]
//!     pub cancel: CancelState,
//! }
//! ```
//!
//! # Listener Example
//!
//! ```ignore
//! use canopy_core::event_listener;
//!
//! struct ChatFilter;
//!
//! #[event_listener]
//! impl ChatFilter {
//!     #[subscribe(priority = "low")]
//!     fn on_chat(&self, chat: &PlayerChat) {
//!         if chat.message.contains("spam") {
//!             chat.cancel.set_cancelled(true);
//!         }
//!     }
//!
//!     #[subscribe(priority = "monitor", invoked_for_cancelled = true)]
//!     fn log_chat(&self, chat: &PlayerChat) -> Result<(), std::io::Error> {
//!         Ok(())
//!     }
//! }
//!
//! // Generated: impl Listener for ChatFilter { ... }
//! manager.register_listener(Arc::new(ChatFilter))?;
//! ```
//!
//! # Attributes
//!
//! ## Struct Attributes (Event)
//!
//! - `#[event(category = "player")]` - Host category: block, player, inventory,
//!   hanging, vehicle, entity or other (default).
//! - `#[event(name = "PlayerChat")]` - Display name used in logs.
//!
//! ## Field Attributes (Event)
//!
//! - `#[event(cancel)]` - The field holding the event's cancel cell. Its type
//!   must implement `Cancellable`. At most one per struct.
//!
//! ## Method Attributes (event_listener)
//!
//! - `#[subscribe]` - Subscribe with normal priority.
//! - `#[subscribe(priority = "high")]` - lowest, low, normal, high, highest, monitor.
//! - `#[subscribe(invoked_for_cancelled = true)]` - Run even for cancelled events.

mod derive_event;
mod event_listener;
mod parse;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput, ItemImpl};

/// Derive macro for events
///
/// Generates an `Event` implementation. Without attributes the event is not
/// cancellable, belongs to the "other" category and is named after its type.
#[proc_macro_derive(Event, attributes(event))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_event::derive_event(input).into()
}

/// Attribute macro for listener objects
///
/// Place on an inherent impl block. Every method tagged `#[subscribe]` whose
/// signature is `fn(&self, &E)` (or `fn(&E)`) becomes a subscription to `E`;
/// methods returning a value are registered as fallible and must return
/// `Result<(), Err>` with `Err: Into<BoxError>`. Tagged methods of any other
/// shape are ignored.
#[proc_macro_attribute]
pub fn event_listener(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        let attr = proc_macro2::TokenStream::from(attr);
        return syn::Error::new_spanned(attr, "#[event_listener] takes no arguments")
            .to_compile_error()
            .into();
    }
    let item = parse_macro_input!(item as ItemImpl);
    event_listener::generate_event_listener(item).into()
}
