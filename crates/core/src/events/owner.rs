//! Owner handles
//!
//! Every subscription is tied to an owner (a plugin or a sub-context) so
//! that everything it registered can be torn down in one call.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use slotmap::new_key_type;

new_key_type! {
    /// Key for owners registered with the runtime
    pub struct OwnerKey;
}

/// Handle for a plugin or context that owns subscriptions
///
/// Cheap to clone. Equality and hashing use the runtime-issued key only.
#[derive(Clone)]
pub struct Owner {
    key: OwnerKey,
    name: Arc<str>,
    active: Arc<AtomicBool>,
}

impl Owner {
    pub(crate) fn new(key: OwnerKey, name: &str) -> Self {
        Self {
            key,
            name: Arc::from(name),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Runtime-issued key
    pub fn key(&self) -> OwnerKey {
        self.key
    }

    /// Display name (e.g., the plugin name)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the owner may still register subscriptions
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Owner {}

impl Hash for Owner {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
