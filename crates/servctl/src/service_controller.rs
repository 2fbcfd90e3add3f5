//! Proxy over a live binding.

use crate::{ControlError, ControlResult, RemoteService, ServerParameters, Status};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Handle for issuing commands to the remote server.
///
/// Cheap to clone. Every clone shares a validity flag that the
/// `ConnectionManager` clears on disconnect or loss, after which each call
/// fails with `ControlError::NotConnected` instead of reaching the transport.
#[derive(Clone)]
pub struct ServiceController {
    service: Arc<dyn RemoteService>,
    bound: Arc<AtomicBool>,
}

impl ServiceController {
    pub(crate) fn new(service: Arc<dyn RemoteService>) -> Self {
        Self {
            service,
            bound: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn invalidate(&self) {
        self.bound.store(false, Ordering::SeqCst);
    }

    /// Whether the binding behind this proxy is still live.
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::SeqCst)
    }

    #[track_caller]
    fn ensure_bound(&self, operation: &'static str) -> ControlResult<()> {
        if self.is_bound() {
            Ok(())
        } else {
            Err(ControlError::not_connected(operation))
        }
    }

    /// Current remote status, read through on every call.
    pub async fn status(&self) -> ControlResult<Status> {
        self.ensure_bound("status")?;
        let status = self
            .service
            .status()
            .await
            .map_err(|e| ControlError::communication("status", e))?;
        debug!("Remote reports status {status}");
        Ok(status)
    }

    /// Parameters the server is actually running with.
    pub async fn current_params(&self) -> ControlResult<ServerParameters> {
        self.ensure_bound("current_params")?;
        self.service
            .current_params()
            .await
            .map_err(|e| ControlError::communication("current_params", e))
    }

    /// Ask the remote to start. Returns before the server is necessarily running.
    pub async fn start_server(&self, params: ServerParameters) -> ControlResult<()> {
        self.ensure_bound("start_server")?;
        debug!("Requesting server start on port {}", params.port);
        self.service
            .start_server(params)
            .await
            .map_err(|e| ControlError::communication("start_server", e))
    }

    /// Ask the remote to stop. Returns before the server is necessarily stopped.
    pub async fn stop_server(&self) -> ControlResult<()> {
        self.ensure_bound("stop_server")?;
        debug!("Requesting server stop");
        self.service
            .stop_server()
            .await
            .map_err(|e| ControlError::communication("stop_server", e))
    }

    pub async fn set_vibrate(&self, vibrate: bool) -> ControlResult<()> {
        self.ensure_bound("set_vibrate")?;
        self.service
            .set_vibrate(vibrate)
            .await
            .map_err(|e| ControlError::communication("set_vibrate", e))
    }
}
