use crate::config::control_config::{default_event_buffer, default_settle_delay};

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Wait after start/stop before trusting a status read (milliseconds)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Capacity of the queue carrying status events to the controller task
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl ControllerSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            event_buffer: default_event_buffer(),
        }
    }
}
