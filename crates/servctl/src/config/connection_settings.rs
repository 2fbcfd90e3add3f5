use crate::config::control_config::{
    default_backoff_multiplier, default_initial_backoff, default_max_backoff,
    default_max_bind_attempts, default_true,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy for a single `connect()` attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Bind attempts per connect request (1 = no retry)
    #[serde(default = "default_max_bind_attempts")]
    pub max_bind_attempts: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the retry delay (milliseconds)
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Growth factor applied to the delay after each failed attempt
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Randomize each delay between 50% and 150%
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl ConnectionSettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_bind_attempts: default_max_bind_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}
