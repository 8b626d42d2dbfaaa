//! Configuration file resolution and TOML loading
//!
//! Resolution priority for the bootstrap file:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/<app>/config.toml`)
//! 4. None: callers fall back to built-in defaults
//!
//! A missing file is never fatal. It is logged and defaults are used.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the bootstrap config file
pub const CONFIG_ENV_VAR: &str = "BPC_CONFIG";

/// Resolve the bootstrap configuration path
///
/// Returns `None` when no candidate exists on disk.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str, app_name: &str) -> Option<PathBuf> {
    // Priority 1: explicit argument, even if it does not exist yet (reported by the loader)
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: platform config directory
    default_config_path(app_name).filter(|p| p.exists())
}

/// Platform default location of `config.toml` for `app_name`
pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(app_name).join("config.toml"))
}

/// Platform default data directory for `app_name`
pub fn default_data_dir(app_name: &str) -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(app_name))
        .unwrap_or_else(|| PathBuf::from(format!("./{}_data", app_name)))
}

/// Load a TOML document, falling back to `T::default()` when absent
///
/// - `None` path or missing file → warning + defaults
/// - Unreadable or malformed file → error (a present but broken file is a
///   configuration mistake the operator needs to see)
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        warn!("No configuration file found, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!("Configuration file {:?} not found, using built-in defaults", path);
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let value = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {:?}: {}", path, e)))?;
    info!("Loaded configuration from {:?}", path);
    Ok(value)
}

/// Write a TOML document atomically (temp file + rename)
pub fn write_toml_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = toml::to_string_pretty(value)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
