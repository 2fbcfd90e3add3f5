use crate::config::control_config::{
    default_log_dir, default_log_file_prefix, default_log_level, default_log_retention,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log directory (relative to the config directory)
    #[serde(default = "default_log_dir")]
    pub directory: String,

    /// Rolling file name prefix
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,

    /// Number of daily log files to keep
    #[serde(default = "default_log_retention")]
    pub max_log_files: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_dir(),
            file_prefix: default_log_file_prefix(),
            max_log_files: default_log_retention(),
        }
    }
}
