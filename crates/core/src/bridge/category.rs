//! Category routing
//!
//! Host events fall into a handful of categories. A [`CategoryHooks`]
//! implementation handles the ones it cares about; the rest fall through
//! to the default no-op methods.

use std::sync::Arc;

use canopy_sdk::{EventCategory, SharedEvent};

use crate::error::EventResult;
use crate::events::{EventManager, Owner, Subscription};

/// Per-category handlers for events crossing the host boundary
pub trait CategoryHooks: Send + Sync {
    fn on_block(&self, _source: Option<&Owner>, _event: &SharedEvent) {}

    fn on_player(&self, _source: Option<&Owner>, _event: &SharedEvent) {}

    fn on_inventory(&self, _source: Option<&Owner>, _event: &SharedEvent) {}

    fn on_hanging(&self, _source: Option<&Owner>, _event: &SharedEvent) {}

    fn on_vehicle(&self, _source: Option<&Owner>, _event: &SharedEvent) {}

    fn on_entity(&self, _source: Option<&Owner>, _event: &SharedEvent) {}

    /// Events with no more specific category
    fn on_other(&self, _source: Option<&Owner>, _event: &SharedEvent) {}
}

/// Hooks that ignore every category
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl CategoryHooks for NoHooks {}

/// Call the hook matching the event's category
pub fn route(hooks: &dyn CategoryHooks, source: Option<&Owner>, event: &SharedEvent) {
    match event.category() {
        EventCategory::Block => hooks.on_block(source, event),
        EventCategory::Player => hooks.on_player(source, event),
        EventCategory::Inventory => hooks.on_inventory(source, event),
        EventCategory::Hanging => hooks.on_hanging(source, event),
        EventCategory::Vehicle => hooks.on_vehicle(source, event),
        EventCategory::Entity => hooks.on_entity(source, event),
        EventCategory::Other => hooks.on_other(source, event),
    }
}

/// Outbound routing: every call on a manager goes to the category hooks
pub struct CategoryDispatcher;

impl CategoryDispatcher {
    /// Observe `manager` on behalf of `owner`, routing each event to `hooks`
    pub fn attach(
        manager: &EventManager,
        owner: &Owner,
        hooks: Arc<dyn CategoryHooks>,
    ) -> EventResult<Subscription> {
        tracing::debug!(
            "Routing calls on manager '{}' to category hooks",
            manager.owner().name()
        );
        manager.on_call(owner, move |source, event| route(hooks.as_ref(), source, event))
    }
}
