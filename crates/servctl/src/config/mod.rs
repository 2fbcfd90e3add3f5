mod connection_settings;
mod control_config;
mod controller_settings;
mod logging_settings;

pub use connection_settings::ConnectionSettings;
pub use control_config::{CONFIG_DIR_ENV, CONFIG_FILENAME, CONFIG_VERSION, ControlConfig};
pub use controller_settings::ControllerSettings;
pub use logging_settings::LoggingSettings;
