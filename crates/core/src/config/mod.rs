//! Configuration system
//!
//! This module provides a trait-based configuration system that supports:
//! - Type-safe config structs via serde
//! - TOML file format
//! - Auto-generation of default configs
//! - Manual reload capability
//!
//! # Example
//!
//! ```ignore
//! use serde::{Deserialize, Serialize};
//! use canopy_core::PluginConfig;
//!
//! #[derive(Default, Serialize, Deserialize)]
//! pub struct RegionConfig {
//!     pub max_regions: u32,
//!     pub greeting: String,
//! }
//!
//! impl PluginConfig for RegionConfig {
//!     const PLUGIN_NAME: &'static str = "regions";
//! }
//!
//! let config = RegionConfig::load().unwrap_or_default();
//! ```

mod loader;

use std::path::Path;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::events::DispatchSettings;

pub use loader::{canopy_base_dir, configs_dir, core_config_path, plugin_config_path, HOME_ENV};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Base directory could not be resolved
    #[error("Config directory not available - CANOPY_HOME is set but empty")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Read a TOML file, or write and return the default if it is missing
fn load_or_create<T>(path: &Path, label: &str) -> ConfigResult<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: T = toml::from_str(&content)?;
        tracing::debug!("Loaded config for {} from {:?}", label, path);
        Ok(config)
    } else {
        let default = T::default();
        write_toml(path, &default)?;
        tracing::info!("Created default config for {} at {:?}", label, path);
        Ok(default)
    }
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Trait for plugin configuration types.
///
/// Implement this trait on your config struct to enable automatic loading,
/// saving, and reloading of configuration files.
///
/// # File Location
///
/// Configs are stored at:
/// `{base}/configs/plugins/{PLUGIN_NAME}/{PLUGIN_NAME}.toml`
pub trait PluginConfig: Default + Serialize + DeserializeOwned + Send + Sync {
    /// The plugin name used for config file path resolution.
    const PLUGIN_NAME: &'static str;

    /// Load config from file, creating default if missing.
    fn load() -> ConfigResult<Self> {
        let path = plugin_config_path(Self::PLUGIN_NAME)?;
        load_or_create(&path, Self::PLUGIN_NAME)
    }

    /// Save config to file.
    ///
    /// Creates parent directories if they don't exist.
    fn save(&self) -> ConfigResult<()> {
        let path = plugin_config_path(Self::PLUGIN_NAME)?;
        write_toml(&path, self)?;
        tracing::debug!("Saved config for {} to {:?}", Self::PLUGIN_NAME, path);
        Ok(())
    }

    /// Reload config from file.
    fn reload(&mut self) -> ConfigResult<()> {
        let path = plugin_config_path(Self::PLUGIN_NAME)?;
        let content = std::fs::read_to_string(&path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded config for {} from {:?}", Self::PLUGIN_NAME, path);
        Ok(())
    }
}

/// Event dispatch tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Ticks a manager remembers a dispatched event (minimum 1)
    pub dedup_window_ticks: u64,

    /// Subscribers running longer than this many microseconds are logged
    pub slow_subscriber_warn_us: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            dedup_window_ticks: 2,
            slow_subscriber_warn_us: 1000,
        }
    }
}

impl EventsConfig {
    /// Dedup window, clamped to at least one tick
    pub fn dedup_window(&self) -> u64 {
        self.dedup_window_ticks.max(1)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            slow_subscriber_warn: Duration::from_micros(self.slow_subscriber_warn_us),
        }
    }
}

/// Core framework configuration.
///
/// Loaded from `{base}/configs/core.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Event dispatch tuning
    pub events: EventsConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            events: EventsConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Load core config from file, creating default if missing.
    pub fn load() -> ConfigResult<Self> {
        load_or_create(&core_config_path()?, "core")
    }

    /// Load core config from an explicit base directory.
    pub fn load_from(base: &Path) -> ConfigResult<Self> {
        load_or_create(&loader::core_config_path_in(base), "core")
    }

    /// Save core config to file.
    pub fn save(&self) -> ConfigResult<()> {
        let path = core_config_path()?;
        write_toml(&path, self)?;
        tracing::debug!("Saved core config to {:?}", path);
        Ok(())
    }

    /// Reload core config from file.
    pub fn reload(&mut self) -> ConfigResult<()> {
        let path = core_config_path()?;
        let content = std::fs::read_to_string(&path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded core config from {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        pub value: i32,
        pub name: String,
    }

    #[test]
    fn test_config_serialize_deserialize() {
        let config = TestConfig {
            value: 42,
            name: "test".to_string(),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: TestConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_core_config_default() {
        let config = CoreConfig::default();
        assert_eq!(config.version, 1);
        assert!(!config.debug);
        assert_eq!(config.events.dedup_window_ticks, 2);
        assert_eq!(config.events.slow_subscriber_warn_us, 1000);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: CoreConfig = toml::from_str("debug = true\n[events]\ndedup_window_ticks = 5\n").unwrap();
        assert!(config.debug);
        assert_eq!(config.version, 1);
        assert_eq!(config.events.dedup_window_ticks, 5);
        assert_eq!(config.events.slow_subscriber_warn_us, 1000);
    }

    #[test]
    fn test_dedup_window_clamped() {
        let events = EventsConfig {
            dedup_window_ticks: 0,
            ..EventsConfig::default()
        };
        assert_eq!(events.dedup_window(), 1);
        assert_eq!(
            events.dispatch_settings().slow_subscriber_warn,
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_load_from_creates_default() {
        let base = std::env::temp_dir().join(format!("canopy-config-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&base);

        let created = CoreConfig::load_from(&base).unwrap();
        assert_eq!(created, CoreConfig::default());
        assert!(base.join("configs").join("core.toml").exists());

        std::fs::write(
            base.join("configs").join("core.toml"),
            "version = 3\ndebug = true\n",
        )
        .unwrap();
        let loaded = CoreConfig::load_from(&base).unwrap();
        assert_eq!(loaded.version, 3);
        assert!(loaded.debug);

        std::fs::remove_dir_all(&base).unwrap();
    }
}
