//! Log subscriber setup
//!
//! The host integration calls [`init`] once during load. The level comes
//! from [`CoreConfig::debug`] and can be overridden with `RUST_LOG`.

use tracing_subscriber::EnvFilter;

use crate::config::CoreConfig;

/// Directive used when `RUST_LOG` is not set
pub fn default_directive(config: &CoreConfig) -> &'static str {
    if config.debug {
        "debug"
    } else {
        "info"
    }
}

/// Install the global fmt subscriber
///
/// Returns `false` if a subscriber was already installed (for example by
/// the host or another plugin), in which case the existing one is kept.
pub fn init(config: &CoreConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialised (debug: {})", config.debug);
    }
    installed
}
