//! Client-side control of a background server process.
//!
//! [`ConnectionManager`] owns the binding to the remote service and fans
//! status changes out to listeners. [`ServiceController`] issues commands over
//! that binding. [`StartStopController`] is the consumer-side toggle that
//! keeps a view in sync with the remote server.

pub mod config;
pub mod logging;

mod address_resolver;
mod connection_manager;
mod connection_state;
mod error;
mod listener_registry;
mod preferences;
mod remote;
mod retry;
mod server_parameters;
mod service_controller;
mod settle_timer;
mod start_stop_controller;
mod status;
mod toggle_state;
mod view;

pub use address_resolver::{AddressResolver, FixedAddress, OutboundInterfaceResolver};
pub use config::ControlConfig;
pub use connection_manager::{ConnectionManager, ReadyCallback};
pub use connection_state::ConnectionState;
pub use error::{ControlError, Result as ControlResult, TransportError};
pub use listener_registry::{ListenerRegistry, StatusListener};
pub use preferences::PreferenceSource;
pub use remote::{Binding, BindingEvent, RemoteService, ServiceBinder};
pub use retry::{RetryPolicy, with_retry};
pub use server_parameters::ServerParameters;
pub use service_controller::ServiceController;
pub use settle_timer::SettleTimer;
pub use start_stop_controller::{
    Collaborators, ControllerSnapshot, PressedCallback, StartStopController,
};
pub use status::Status;
pub use toggle_state::ToggleState;
pub use view::{Indicator, StartStopView, server_url};

#[cfg(test)]
mod tests;
