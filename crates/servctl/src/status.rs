use serde::Serialize;

/// Observed state of the remote server.
///
/// Only meaningful while the owning `ConnectionManager` is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Server is accepting clients
    Running,
    /// Server process is alive but not serving
    Stopped,
    /// No binding to the service; synthesized locally, never pushed by the remote
    Disconnected,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
