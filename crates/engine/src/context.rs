//! Host context
//!
//! Everything the event runtime needs from the host, acquired once during
//! plugin load and handed to the runtime explicitly.

use std::sync::Arc;
use std::thread::ThreadId;

use crate::bus::HostEventBus;

/// Host state shared with the event runtime
#[derive(Clone)]
pub struct HostContext {
    /// Native event bus
    bus: Arc<dyn HostEventBus>,

    /// Main game thread ID for thread safety checks
    main_thread_id: ThreadId,
}

impl HostContext {
    /// Create a context, capturing the current thread as the main thread
    ///
    /// Call this from the host's main thread during plugin load.
    pub fn new(bus: Arc<dyn HostEventBus>) -> Self {
        Self::with_main_thread(bus, std::thread::current().id())
    }

    /// Create a context with an explicit main thread
    pub fn with_main_thread(bus: Arc<dyn HostEventBus>, main_thread_id: ThreadId) -> Self {
        tracing::debug!("Host context created (main thread {:?})", main_thread_id);
        Self {
            bus,
            main_thread_id,
        }
    }

    /// The native event bus
    pub fn bus(&self) -> &Arc<dyn HostEventBus> {
        &self.bus
    }

    /// Main game thread ID
    pub fn main_thread_id(&self) -> ThreadId {
        self.main_thread_id
    }

    /// Check if current thread is the main game thread
    pub fn is_main_thread(&self) -> bool {
        std::thread::current().id() == self.main_thread_id
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("main_thread_id", &self.main_thread_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackBus;

    #[test]
    fn test_main_thread_captured() {
        let context = HostContext::new(Arc::new(LoopbackBus::new()));
        assert!(context.is_main_thread());

        let other = context.clone();
        let on_other_thread = std::thread::spawn(move || other.is_main_thread())
            .join()
            .unwrap();
        assert!(!on_other_thread);
    }
}
