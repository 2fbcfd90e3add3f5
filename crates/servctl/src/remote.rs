//! Seams to the remote server process.

use crate::{ServerParameters, Status, TransportError};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Calls the remote server process accepts.
///
/// Implementations live on the transport side (IPC, local socket, in-process
/// test double). Every call may fail once the endpoint is gone.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn start_server(&self, params: ServerParameters) -> Result<(), TransportError>;
    async fn stop_server(&self) -> Result<(), TransportError>;
    async fn status(&self) -> Result<Status, TransportError>;
    async fn current_params(&self) -> Result<ServerParameters, TransportError>;
    async fn set_vibrate(&self, vibrate: bool) -> Result<(), TransportError>;
}

/// Notification travelling from the remote side to the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingEvent {
    /// Remote server changed state; only `Running` and `Stopped` are valid here
    StatusChanged(Status),
    /// The endpoint vanished (process died, binding revoked)
    ServiceLost,
}

/// A live binding: the callable service plus its event feed.
///
/// Closing the event feed is treated the same as `BindingEvent::ServiceLost`.
pub struct Binding {
    pub service: Arc<dyn RemoteService>,
    pub events: mpsc::Receiver<BindingEvent>,
}

/// Establishes and releases bindings to the remote service.
#[async_trait]
pub trait ServiceBinder: Send + Sync {
    async fn bind(&self) -> Result<Binding, TransportError>;

    /// Release the current binding. Must be a no-op when nothing is bound.
    fn unbind(&self);
}
