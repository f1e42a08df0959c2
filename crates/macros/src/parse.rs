//! Attribute parsing for the Event derive and the listener attribute

use darling::ast::NestedMeta;
use darling::{FromDeriveInput, FromField, FromMeta};
use syn::{Attribute, Generics, Ident, Meta};

/// Parsed #[event(...)] attributes on the struct
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(event), supports(struct_any))]
pub struct EventArgs {
    /// Struct identifier
    pub ident: Ident,

    /// Struct generics
    pub generics: Generics,

    /// Struct fields
    pub data: darling::ast::Data<(), EventFieldArgs>,

    /// Host category (e.g., "player")
    #[darling(default)]
    pub category: Option<String>,

    /// Display name overriding the Rust type name
    #[darling(default)]
    pub name: Option<String>,
}

/// Parsed #[event(...)] attributes on a field
#[derive(Debug, FromField)]
#[darling(attributes(event))]
pub struct EventFieldArgs {
    /// Field identifier (None for tuple structs)
    pub ident: Option<Ident>,

    /// Whether this field is the event's cancel cell
    #[darling(default)]
    pub cancel: bool,
}

/// Parsed #[subscribe(...)] attributes on a listener method
#[derive(Debug, Default, FromMeta)]
pub struct SubscribeArgs {
    /// Priority name, case-insensitive (defaults to normal)
    #[darling(default)]
    pub priority: Option<String>,

    /// Run even when the event is already cancelled
    #[darling(default)]
    pub invoked_for_cancelled: bool,
}

impl SubscribeArgs {
    /// Parse `#[subscribe]` or `#[subscribe(...)]`
    pub fn from_attribute(attr: &Attribute) -> darling::Result<Self> {
        match &attr.meta {
            Meta::Path(_) => Ok(Self::default()),
            Meta::List(list) => {
                let items = NestedMeta::parse_meta_list(list.tokens.clone())?;
                Self::from_list(&items)
            }
            Meta::NameValue(_) => {
                Err(darling::Error::unsupported_format("name-value").with_span(attr))
            }
        }
    }
}

/// Map a priority name to its `Priority` variant
pub fn priority_variant(value: &str) -> Option<&'static str> {
    match value.to_ascii_lowercase().as_str() {
        "lowest" => Some("Lowest"),
        "low" => Some("Low"),
        "normal" => Some("Normal"),
        "high" => Some("High"),
        "highest" => Some("Highest"),
        "monitor" => Some("Monitor"),
        _ => None,
    }
}

/// Map a category name to its `EventCategory` variant
pub fn category_variant(value: &str) -> Option<&'static str> {
    match value.to_ascii_lowercase().as_str() {
        "block" => Some("Block"),
        "player" => Some("Player"),
        "inventory" => Some("Inventory"),
        "hanging" => Some("Hanging"),
        "vehicle" => Some("Vehicle"),
        "entity" => Some("Entity"),
        "other" => Some("Other"),
        _ => None,
    }
}
