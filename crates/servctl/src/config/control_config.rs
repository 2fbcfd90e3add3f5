//! Controller configuration with validation, versioning and env overrides.

use crate::config::{ConnectionSettings, ControllerSettings, LoggingSettings};
use crate::{ControlError, ControlResult, PreferenceSource, ServerParameters};

use std::panic::Location;
use std::path::{Path, PathBuf};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration version for migration support.
/// Increment when adding new fields or changing structure.
pub const CONFIG_VERSION: u32 = 1;

pub const CONFIG_FILENAME: &str = "servctl.toml";
pub const CONFIG_DIR_ENV: &str = "SERVCTL_CONFIG_DIR";

const DEFAULT_CONFIG_DIR: &str = ".servctl";
const DEFAULT_SETTLE_DELAY_MS: u64 = 500;
const DEFAULT_EVENT_BUFFER: usize = 32;
const DEFAULT_MAX_BIND_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;
const DEFAULT_MAX_BACKOFF_MS: u64 = 5000;
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE_PREFIX: &str = "servctl";
const DEFAULT_LOG_RETENTION: usize = 7;

const MAX_SETTLE_DELAY_MS: u64 = 10_000;
const MAX_BIND_ATTEMPTS: u32 = 20;
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Config file format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Parameters requested when starting the server
    #[serde(default)]
    pub server: ServerParameters,

    /// Start/stop orchestration settings
    #[serde(default)]
    pub controller: ControllerSettings,

    /// Bind retry settings
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

// === Default Value Functions ===

fn default_version() -> u32 {
    CONFIG_VERSION
}
pub(crate) fn default_true() -> bool {
    true
}
pub(crate) fn default_settle_delay() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}
pub(crate) fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}
pub(crate) fn default_max_bind_attempts() -> u32 {
    DEFAULT_MAX_BIND_ATTEMPTS
}
pub(crate) fn default_initial_backoff() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}
pub(crate) fn default_max_backoff() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}
pub(crate) fn default_backoff_multiplier() -> f64 {
    DEFAULT_BACKOFF_MULTIPLIER
}
pub(crate) fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.into()
}
pub(crate) fn default_log_dir() -> String {
    DEFAULT_LOG_DIR.into()
}
pub(crate) fn default_log_file_prefix() -> String {
    DEFAULT_LOG_FILE_PREFIX.into()
}
pub(crate) fn default_log_retention() -> usize {
    DEFAULT_LOG_RETENTION
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerParameters::default(),
            controller: ControllerSettings::default(),
            connection: ConnectionSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

// === Configuration Operations ===

impl ControlConfig {
    /// Load config from the default config directory.
    ///
    /// Loading order:
    /// 1. `SERVCTL_CONFIG_DIR` env var, else `./.servctl/`
    /// 2. Load `servctl.toml`, creating it with defaults if missing
    /// 3. Apply `SERVCTL_*` environment variable overrides
    /// 4. Validate
    pub fn load() -> ControlResult<Self> {
        let config_dir = Self::config_dir()?;
        Self::load_or_create(&config_dir)
    }

    /// Get the config directory.
    /// Priority: SERVCTL_CONFIG_DIR env var > ./.servctl/ (relative to cwd)
    pub fn config_dir() -> ControlResult<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        let cwd = std::env::current_dir().map_err(|e| ControlError::Io {
            path: PathBuf::from("."),
            source: e,
            location: ErrorLocation::from(Location::caller()),
        })?;
        Ok(cwd.join(DEFAULT_CONFIG_DIR))
    }

    /// Load config from `config_dir`, creating a default file if none exists.
    pub fn load_or_create(config_dir: &Path) -> ControlResult<Self> {
        std::fs::create_dir_all(config_dir).map_err(|e| io_error(config_dir, e))?;

        let config_path = config_dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| io_error(&config_path, e))?;
            let mut config: Self = toml::from_str(&content).map_err(|e| ControlError::Toml {
                path: config_path.clone(),
                source: e,
                location: ErrorLocation::from(Location::caller()),
            })?;

            if config.version < CONFIG_VERSION {
                config = Self::migrate(config);
                config.save(config_dir)?;
            }
            config
        } else {
            let config = Self::default();
            config.save(config_dir)?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save config to file atomically.
    ///
    /// Uses write-to-temp-then-rename so an interrupted write never leaves
    /// a truncated file behind.
    pub fn save(&self, config_dir: &Path) -> ControlResult<()> {
        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = toml::to_string_pretty(self).map_err(|e| ControlError::ConfigInvalid {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let temp_path = config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &content).map_err(|e| io_error(&temp_path, e))?;
        std::fs::rename(&temp_path, &config_path).map_err(|e| io_error(&config_path, e))?;

        Ok(())
    }

    fn migrate(mut config: Self) -> Self {
        // Version 0 -> 1: bind retry settings introduced
        if config.version == 0 {
            config.connection = ConnectionSettings::default();
            config.version = 1;
        }

        config
    }

    /// Validate configuration values.
    pub fn validate(&self) -> ControlResult<()> {
        self.server.validate()?;

        if self.controller.settle_delay_ms > MAX_SETTLE_DELAY_MS {
            return Err(ControlError::config(format!(
                "controller.settle_delay_ms must be <= {MAX_SETTLE_DELAY_MS}"
            )));
        }

        if self.controller.event_buffer == 0 {
            return Err(ControlError::config("controller.event_buffer must be > 0"));
        }

        if self.connection.max_bind_attempts == 0
            || self.connection.max_bind_attempts > MAX_BIND_ATTEMPTS
        {
            return Err(ControlError::config(format!(
                "connection.max_bind_attempts must be between 1 and {MAX_BIND_ATTEMPTS}"
            )));
        }

        if self.connection.initial_backoff_ms > self.connection.max_backoff_ms {
            return Err(ControlError::config(
                "connection.initial_backoff_ms must not exceed connection.max_backoff_ms",
            ));
        }

        if self.connection.backoff_multiplier < 1.0 {
            return Err(ControlError::config(
                "connection.backoff_multiplier must be >= 1.0",
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ControlError::config(format!(
                "logging.level must be one of {VALID_LOG_LEVELS:?}, got {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Log configuration summary.
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!(
            "  server: port={} www={} max_clients={} vibrate={}",
            self.server.port, self.server.www_path, self.server.max_clients, self.server.vibrate
        );
        info!(
            "  controller: settle={}ms, event_buffer={}",
            self.controller.settle_delay_ms, self.controller.event_buffer
        );
        info!(
            "  connection: attempts={}, backoff={}ms..{}ms x{}, jitter={}",
            self.connection.max_bind_attempts,
            self.connection.initial_backoff_ms,
            self.connection.max_backoff_ms,
            self.connection.backoff_multiplier,
            self.connection.jitter
        );
        info!(
            "  logging: {} ({}/{}.*)",
            self.logging.level, self.logging.directory, self.logging.file_prefix
        );
    }

    fn apply_env_overrides(&mut self) {
        // Server
        Self::apply_env_parse("SERVCTL_SERVER_PORT", &mut self.server.port);
        Self::apply_env_string("SERVCTL_SERVER_WWW_PATH", &mut self.server.www_path);
        Self::apply_env_parse("SERVCTL_SERVER_MAX_CLIENTS", &mut self.server.max_clients);
        Self::apply_env_bool("SERVCTL_SERVER_VIBRATE", &mut self.server.vibrate);

        // Controller
        Self::apply_env_parse(
            "SERVCTL_SETTLE_DELAY_MS",
            &mut self.controller.settle_delay_ms,
        );

        // Connection
        Self::apply_env_parse(
            "SERVCTL_BIND_MAX_ATTEMPTS",
            &mut self.connection.max_bind_attempts,
        );
        Self::apply_env_parse(
            "SERVCTL_BIND_INITIAL_BACKOFF_MS",
            &mut self.connection.initial_backoff_ms,
        );
        Self::apply_env_parse(
            "SERVCTL_BIND_MAX_BACKOFF_MS",
            &mut self.connection.max_backoff_ms,
        );
        Self::apply_env_bool("SERVCTL_BIND_JITTER", &mut self.connection.jitter);

        // Logging
        Self::apply_env_string("SERVCTL_LOG_LEVEL", &mut self.logging.level);
        Self::apply_env_string("SERVCTL_LOG_DIR", &mut self.logging.directory);
    }

    /// Helper: Apply environment variable override for String values
    fn apply_env_string(var_name: &str, target: &mut String) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val;
        }
    }

    /// Helper: Apply environment variable override for bool values (accepts "true"/"1")
    fn apply_env_bool(var_name: &str, target: &mut bool) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val == "true" || val == "1";
        }
    }

    /// Helper: Apply environment variable override for parseable values
    fn apply_env_parse<T: std::str::FromStr>(var_name: &str, target: &mut T) {
        if let Ok(val) = std::env::var(var_name)
            && let Ok(parsed) = val.parse()
        {
            *target = parsed;
        }
    }
}

impl PreferenceSource for ControlConfig {
    fn server_parameters(&self) -> ServerParameters {
        self.server.clone()
    }
}

#[track_caller]
fn io_error(path: &Path, source: std::io::Error) -> ControlError {
    ControlError::Io {
        path: path.to_path_buf(),
        source,
        location: ErrorLocation::from(Location::caller()),
    }
}
