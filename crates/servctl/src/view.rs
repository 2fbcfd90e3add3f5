use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

/// Text shown next to the start/stop toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Indicator {
    /// Server is reachable at this address
    Url { address: IpAddr, port: u16 },
    Stopped,
    ConnectionError,
}

impl Indicator {
    pub fn url(&self) -> Option<String> {
        match self {
            Self::Url { address, port } => Some(server_url(*address, *port)),
            _ => None,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url { address, port } => {
                write!(f, "Server URL: {}", server_url(*address, *port))
            }
            Self::Stopped => f.write_str("Server stopped"),
            Self::ConnectionError => f.write_str("Error connecting to the server service"),
        }
    }
}

/// Build the URL clients use to reach the server.
pub fn server_url(address: IpAddr, port: u16) -> String {
    match address {
        IpAddr::V4(v4) => format!("http://{v4}:{port}"),
        IpAddr::V6(v6) => format!("http://[{v6}]:{port}"),
    }
}

/// Presentation sink driven by `StartStopController`.
///
/// Never called directly from a status listener callback.
pub trait StartStopView: Send + Sync {
    fn set_checked(&self, checked: bool);
    fn set_indicator(&self, indicator: Indicator);
}
