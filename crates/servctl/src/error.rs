use std::panic::Location;
use std::path::PathBuf;

use error_location::ErrorLocation;
use thiserror::Error;

/// Failure reported by the transport between this process and the remote service.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("service endpoint is gone")]
    EndpointGone,

    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("transport IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether a fresh attempt against the same endpoint may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::EndpointGone | Self::Io(_))
    }
}

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Communication with the service failed during {operation}: {source} {location}")]
    Communication {
        operation: &'static str,
        #[source]
        source: TransportError,
        location: ErrorLocation,
    },

    #[error("Not connected to the service ({operation}) {location}")]
    NotConnected {
        operation: &'static str,
        location: ErrorLocation,
    },

    #[error("Failed to bind to the service after {attempts} attempts: {source} {location}")]
    BindFailed {
        attempts: u32,
        #[source]
        source: TransportError,
        location: ErrorLocation,
    },

    #[error("Settle wait after {operation} was interrupted {location}")]
    OperationInterrupted {
        operation: &'static str,
        location: ErrorLocation,
    },

    #[error("Configuration invalid: {message} {location}")]
    ConfigInvalid {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO error at {path}: {source} {location}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("TOML parse error in {path}: {source} {location}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
        location: ErrorLocation,
    },

    #[error("Logging setup failed: {message} {location}")]
    Logging {
        message: String,
        location: ErrorLocation,
    },
}

impl ControlError {
    #[track_caller]
    pub fn communication(operation: &'static str, source: TransportError) -> Self {
        Self::Communication {
            operation,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn not_connected(operation: &'static str) -> Self {
        Self::NotConnected {
            operation,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn interrupted(operation: &'static str) -> Self {
        Self::OperationInterrupted {
            operation,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Whether this error means the service could not be reached.
    ///
    /// Every such error is recoverable by resetting local state.
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            Self::Communication { .. } | Self::NotConnected { .. } | Self::BindFailed { .. }
        )
    }

    /// Whether this error is recoverable via retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Communication { source, .. } | Self::BindFailed { source, .. } => {
                source.is_transient()
            }
            Self::NotConnected { .. } => true,
            _ => false,
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::Communication { .. } | Self::NotConnected { .. } => {
                "Lost contact with the server service. \
                   The connection will be re-established automatically."
            }
            Self::BindFailed { .. } => {
                "Unable to reach the server service. \
                   Make sure it is installed and allowed to run in the background."
            }
            Self::OperationInterrupted { .. } => {
                "The last start/stop request was not confirmed. \
                   Check the server status before retrying."
            }
            Self::ConfigInvalid { .. } | Self::Toml { .. } => {
                "Configuration file has invalid settings. \
                   Check the logs for details or delete the config file to use defaults."
            }
            Self::Io { .. } => {
                "Unable to access the configuration directory. \
                   Check file permissions or available disk space."
            }
            Self::Logging { .. } => "Logging could not be initialized. Check the log directory.",
        }
    }
}

pub type Result<T> = std::result::Result<T, ControlError>;
