//! Configuration for the focus controller
//!
//! Two layers:
//! 1. **TOML bootstrap** (`TomlConfig`): logging, preference file location and
//!    the `[focus]` table. Read once at startup.
//! 2. **Reactive preferences** (`crate::preferences`): user-facing toggles that
//!    may change while running.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments
//! 2. `BPC_CONFIG` environment variable (path to the TOML file)
//! 3. Platform config directory
//! 4. Built-in defaults (code constants)

use crate::error::Result;
use bpc_common::config::{default_data_dir, load_toml_or_default, resolve_config_path, CONFIG_ENV_VAR};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Application directory name used for config/data lookup
pub const APP_NAME: &str = "bpc-focus";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Preference file (sleep timer target and toggles)
    ///
    /// Default: `<data_local_dir>/bpc-focus/preferences.toml`
    #[serde(default)]
    pub preferences_path: Option<PathBuf>,

    /// Controller tunables
    #[serde(default)]
    pub focus: FocusConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Controller tunables
///
/// All windows and delays are milliseconds in the file and exposed as
/// `Duration` through accessor methods.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Wait before acting on a noisy-route event
    pub route_settle_ms: u64,
    /// How long a remote (automotive-class) controller counts as recently active
    pub remote_controller_window_ms: u64,
    /// How long any non-local controller counts as recently active
    pub external_controller_window_ms: u64,
    /// How long after engine start the start counts as recent
    pub engine_start_window_ms: u64,
    /// Delay before a forced recovery check after a permanent loss
    pub forced_recovery_delay_ms: u64,
    /// Delay before a recovery check after a transient loss
    pub transient_recovery_delay_ms: u64,
    /// Delay after a fired recovery before confirming playback started
    pub post_recovery_confirm_ms: u64,
    /// A retry may bypass the primary cooldown only this soon after a fired recovery
    pub post_recovery_window_ms: u64,
    /// Cooldown windows per recovery category
    pub cooldowns: CooldownConfig,
    /// Absolute volume used while ducked (never raises the volume)
    pub duck_volume: f32,
    /// Interval between crossfade ramp volume steps
    pub crossfade_step_ms: u64,
    /// Ramp shape for crossfades
    pub crossfade_curve: bpc_common::FadeCurve,
    /// Case-insensitive substrings identifying automotive-class controller clients
    pub automotive_client_patterns: Vec<String>,
    /// Identifiers of in-process/local controllers (never tracked as external)
    pub local_client_ids: Vec<String>,
    /// Notice bus capacity
    pub notice_capacity: usize,
}

/// Cooldown windows (milliseconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub forced_permanent_ms: u64,
    pub transient_ms: u64,
    pub post_recovery_retry_ms: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            forced_permanent_ms: 10_000,
            transient_ms: 5_000,
            post_recovery_retry_ms: 15_000,
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            route_settle_ms: 500,
            remote_controller_window_ms: 30_000,
            external_controller_window_ms: 30_000,
            engine_start_window_ms: 5_000,
            forced_recovery_delay_ms: 1_500,
            transient_recovery_delay_ms: 2_500,
            post_recovery_confirm_ms: 1_000,
            post_recovery_window_ms: 5_000,
            cooldowns: CooldownConfig::default(),
            duck_volume: 0.2,
            crossfade_step_ms: 50,
            crossfade_curve: bpc_common::FadeCurve::Linear,
            automotive_client_patterns: vec![
                "gearhead".to_string(),
                "android.car".to_string(),
                "automotive".to_string(),
                "carplay".to_string(),
                "com.google.android.projection".to_string(),
            ],
            local_client_ids: vec!["bpc-focus".to_string()],
            notice_capacity: 256,
        }
    }
}

impl FocusConfig {
    pub fn route_settle(&self) -> Duration {
        Duration::from_millis(self.route_settle_ms)
    }

    pub fn remote_controller_window(&self) -> Duration {
        Duration::from_millis(self.remote_controller_window_ms)
    }

    pub fn external_controller_window(&self) -> Duration {
        Duration::from_millis(self.external_controller_window_ms)
    }

    pub fn engine_start_window(&self) -> Duration {
        Duration::from_millis(self.engine_start_window_ms)
    }

    pub fn forced_recovery_delay(&self) -> Duration {
        Duration::from_millis(self.forced_recovery_delay_ms)
    }

    pub fn transient_recovery_delay(&self) -> Duration {
        Duration::from_millis(self.transient_recovery_delay_ms)
    }

    pub fn post_recovery_confirm(&self) -> Duration {
        Duration::from_millis(self.post_recovery_confirm_ms)
    }

    pub fn post_recovery_window(&self) -> Duration {
        Duration::from_millis(self.post_recovery_window_ms)
    }

    pub fn crossfade_step(&self) -> Duration {
        // A zero step would spin the queue
        Duration::from_millis(self.crossfade_step_ms.max(1))
    }
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Source file, if one was found
    pub source: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub preferences_path: PathBuf,
    pub focus: FocusConfig,
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub preferences_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration following the documented priority order
    ///
    /// # Errors
    ///
    /// Returns error if a config file exists but cannot be read or parsed.
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let source = resolve_config_path(overrides.config_path.as_deref(), CONFIG_ENV_VAR, APP_NAME);
        let toml_config: TomlConfig = load_toml_or_default(source.as_deref())?;
        Ok(Self::from_toml(toml_config, source, overrides))
    }

    /// Load from an explicit file path (no environment lookup)
    pub fn load_from(path: &Path) -> Result<Self> {
        let toml_config: TomlConfig = load_toml_or_default(Some(path))?;
        Ok(Self::from_toml(toml_config, Some(path.to_path_buf()), ConfigOverrides::default()))
    }

    fn from_toml(toml_config: TomlConfig, source: Option<PathBuf>, overrides: ConfigOverrides) -> Self {
        let mut logging = toml_config.logging;
        if let Some(level) = overrides.log_level {
            logging.level = level;
        }

        let preferences_path = overrides
            .preferences_path
            .or(toml_config.preferences_path)
            .unwrap_or_else(|| default_data_dir(APP_NAME).join("preferences.toml"));

        info!("Preferences file: {:?}", preferences_path);

        Self {
            source,
            logging,
            preferences_path,
            focus: toml_config.focus,
        }
    }
}
