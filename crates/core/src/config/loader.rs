//! Config path resolution
//!
//! Config files live below the canopy base directory, which is taken from
//! the `CANOPY_HOME` environment variable or, failing that, the current
//! working directory (the host server's root).

use std::path::{Path, PathBuf};

use super::{ConfigError, ConfigResult};

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "CANOPY_HOME";

/// Returns the canopy base directory.
pub fn canopy_base_dir() -> ConfigResult<PathBuf> {
    match std::env::var_os(HOME_ENV) {
        Some(home) if home.is_empty() => Err(ConfigError::NoConfigDirectory),
        Some(home) => Ok(PathBuf::from(home)),
        None => Ok(std::env::current_dir()?),
    }
}

/// Returns the base configs directory.
///
/// Path: `{base}/configs/`
pub fn configs_dir() -> ConfigResult<PathBuf> {
    Ok(configs_dir_in(&canopy_base_dir()?))
}

/// Returns the path for a plugin's config file.
///
/// Path: `{base}/configs/plugins/{plugin_name}/{plugin_name}.toml`
pub fn plugin_config_path(plugin_name: &str) -> ConfigResult<PathBuf> {
    Ok(plugin_config_path_in(&canopy_base_dir()?, plugin_name))
}

/// Returns the core config path.
///
/// Path: `{base}/configs/core.toml`
pub fn core_config_path() -> ConfigResult<PathBuf> {
    Ok(core_config_path_in(&canopy_base_dir()?))
}

pub(crate) fn configs_dir_in(base: &Path) -> PathBuf {
    base.join("configs")
}

pub(crate) fn plugin_config_path_in(base: &Path, plugin_name: &str) -> PathBuf {
    configs_dir_in(base)
        .join("plugins")
        .join(plugin_name)
        .join(format!("{}.toml", plugin_name))
}

pub(crate) fn core_config_path_in(base: &Path) -> PathBuf {
    configs_dir_in(base).join("core.toml")
}
