use serde::Serialize;

/// State of the start/stop toggle as believed locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleState {
    Off,
    TransitioningOn,
    On,
    TransitioningOff,
    /// A command or the connection failed; always followed by a reset to `Off`
    Error,
}

impl ToggleState {
    pub fn is_transitioning(self) -> bool {
        matches!(self, Self::TransitioningOn | Self::TransitioningOff)
    }

    /// Value the toggle representation shows for this state.
    pub fn is_checked(self) -> bool {
        matches!(self, Self::On | Self::TransitioningOn)
    }
}
