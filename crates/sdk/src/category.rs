//! Host event categories

use std::fmt;

/// Coarse category of a host event
///
/// The bridge routes events through one hook per category so forwarders
/// can specialise without re-deriving the category from the concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventCategory {
    Block,
    Player,
    Inventory,
    Hanging,
    Vehicle,
    Entity,
    #[default]
    Other,
}

impl EventCategory {
    /// Lowercase name (e.g., "player")
    pub const fn as_str(self) -> &'static str {
        match self {
            EventCategory::Block => "block",
            EventCategory::Player => "player",
            EventCategory::Inventory => "inventory",
            EventCategory::Hanging => "hanging",
            EventCategory::Vehicle => "vehicle",
            EventCategory::Entity => "entity",
            EventCategory::Other => "other",
        }
    }

    /// Parse a lowercase category name
    pub fn from_name(name: &str) -> Option<Self> {
        let category = match name {
            "block" => EventCategory::Block,
            "player" => EventCategory::Player,
            "inventory" => EventCategory::Inventory,
            "hanging" => EventCategory::Hanging,
            "vehicle" => EventCategory::Vehicle,
            "entity" => EventCategory::Entity,
            "other" => EventCategory::Other,
            _ => return None,
        };
        Some(category)
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
