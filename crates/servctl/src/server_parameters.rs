use crate::{ControlError, ControlResult};

use serde::{Deserialize, Serialize};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_WWW_PATH: &str = "www";
const DEFAULT_ERROR_PATH: &str = "error";
const DEFAULT_CACHE_EXPIRATION_SECS: u64 = 3600;
const DEFAULT_MAX_CLIENTS: u32 = 10;

const MIN_PORT: u16 = 1;
const MAX_CLIENTS_LIMIT: u32 = 1000;

/// Options the remote server is started with.
///
/// Owned by the caller and passed by value into `start_server`. The remote
/// may end up running with different values; `current_params` is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerParameters {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served as the web root
    #[serde(default = "default_www_path")]
    pub www_path: String,

    /// Directory holding error pages
    #[serde(default = "default_error_path")]
    pub error_path: String,

    /// Client cache expiration for served files (seconds)
    #[serde(default = "default_cache_expiration")]
    pub cache_expiration_secs: u64,

    /// List directory contents when no index file exists
    #[serde(default)]
    pub file_indexing: bool,

    /// Maximum concurrent clients
    #[serde(default = "default_max_clients")]
    pub max_clients: u32,

    /// Vibrate on server events
    #[serde(default)]
    pub vibrate: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_www_path() -> String {
    DEFAULT_WWW_PATH.into()
}
fn default_error_path() -> String {
    DEFAULT_ERROR_PATH.into()
}
fn default_cache_expiration() -> u64 {
    DEFAULT_CACHE_EXPIRATION_SECS
}
fn default_max_clients() -> u32 {
    DEFAULT_MAX_CLIENTS
}

impl Default for ServerParameters {
    fn default() -> Self {
        Self {
            port: default_port(),
            www_path: default_www_path(),
            error_path: default_error_path(),
            cache_expiration_secs: default_cache_expiration(),
            file_indexing: false,
            max_clients: default_max_clients(),
            vibrate: false,
        }
    }
}

impl ServerParameters {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> ControlResult<()> {
        if self.port < MIN_PORT {
            return Err(ControlError::config(format!(
                "server.port must be between {MIN_PORT} and 65535, got {}",
                self.port
            )));
        }

        if self.max_clients == 0 || self.max_clients > MAX_CLIENTS_LIMIT {
            return Err(ControlError::config(format!(
                "server.max_clients must be between 1 and {MAX_CLIENTS_LIMIT}, got {}",
                self.max_clients
            )));
        }

        if self.www_path.trim().is_empty() {
            return Err(ControlError::config("server.www_path cannot be empty"));
        }

        Ok(())
    }
}
