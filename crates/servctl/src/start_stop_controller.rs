//! Start/stop toggle kept in sync with the remote server.

use crate::config::ControllerSettings;
use crate::{
    AddressResolver, ConnectionManager, ControlError, ControlResult, Indicator, PreferenceSource,
    ServerParameters, StartStopView, Status, StatusListener, ToggleState, server_url,
};

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Receives the final toggle value after every user command.
pub type PressedCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Everything the controller talks to besides the connection.
pub struct Collaborators {
    pub preferences: Arc<dyn PreferenceSource>,
    pub resolver: Arc<dyn AddressResolver>,
    pub view: Arc<dyn StartStopView>,
    pub on_pressed: Option<PressedCallback>,
}

/// Serializable view of the controller for a frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub state: ToggleState,
    pub checked: bool,
    pub indicator: Indicator,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControllerEvent {
    Ready,
    /// Binding lost; reset and reconnect
    Lost,
    Status(Status),
}

/// Consumer-side state machine driving a start/stop toggle.
///
/// User commands are serialized; listener events are marshalled onto the
/// controller's own task before they touch any state. Failures never escape:
/// they reset the toggle to off, surface `Indicator::ConnectionError`, and are
/// logged.
pub struct StartStopController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    manager: ConnectionManager,
    preferences: Arc<dyn PreferenceSource>,
    resolver: Arc<dyn AddressResolver>,
    view: Arc<dyn StartStopView>,
    on_pressed: Option<PressedCallback>,
    settings: ControllerSettings,
    settle: crate::SettleTimer,
    runtime: Handle,
    command_lock: tokio::sync::Mutex<()>,
    state_tx: watch::Sender<ToggleState>,
    indicator: Mutex<Indicator>,
    session: Mutex<Option<Session>>,
}

/// Registration held between `resume()` and `pause()`.
struct Session {
    listener: Arc<dyn StatusListener>,
    events_task: JoinHandle<()>,
}

/// Listener that only forwards events to the controller task.
///
/// `Running`/`Stopped` go through the bounded status queue and may be dropped
/// when it is full. Loss and readiness use an unbounded control queue, since
/// each one triggers a reconnect or a resync that nothing else would.
struct EventForwarder {
    status_tx: mpsc::Sender<Status>,
    control_tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl StatusListener for EventForwarder {
    fn on_status_changed(&self, status: Status) {
        if status == Status::Disconnected {
            if self.control_tx.send(ControllerEvent::Lost).is_err() {
                debug!("Start/stop controller stopped, ignoring disconnect");
            }
            return;
        }

        if let Err(e) = self.status_tx.try_send(status) {
            warn!("Dropped {status} event for start/stop controller: {e}");
        }
    }
}

impl StartStopController {
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        manager: ConnectionManager,
        collaborators: Collaborators,
        settings: ControllerSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(ToggleState::Off);

        Self {
            inner: Arc::new(ControllerInner {
                manager,
                preferences: collaborators.preferences,
                resolver: collaborators.resolver,
                view: collaborators.view,
                on_pressed: collaborators.on_pressed,
                settings,
                settle: crate::SettleTimer::new(),
                runtime: Handle::current(),
                command_lock: tokio::sync::Mutex::new(()),
                state_tx,
                indicator: Mutex::new(Indicator::Stopped),
                session: Mutex::new(None),
            }),
        }
    }

    /// Register for status events and connect.
    ///
    /// Once the binding is ready the remote status is queried once to
    /// initialize the toggle. Calling `resume` twice without `pause` is a no-op.
    pub fn resume(&self) {
        let mut session = self.inner.lock_session();
        if session.is_some() {
            debug!("Start/stop controller already resumed");
            return;
        }

        self.inner.settle.reset();

        let (status_tx, status_rx) = mpsc::channel(self.inner.settings.event_buffer);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn StatusListener> = Arc::new(EventForwarder {
            status_tx,
            control_tx: control_tx.clone(),
        });
        let events_task = self.inner.runtime.spawn(Arc::clone(&self.inner).run_events(
            status_rx,
            control_rx,
            control_tx.downgrade(),
        ));

        self.inner.manager.add_status_listener(&listener);
        self.inner.manager.connect(Some(ready_callback(control_tx)));

        *session = Some(Session {
            listener,
            events_task,
        });
    }

    /// Unregister, disconnect, and stop processing events.
    ///
    /// A command in progress is interrupted: remote calls already sent are not
    /// aborted, but their outcome no longer reaches the view. Commands issued
    /// while paused do nothing.
    pub fn pause(&self) {
        let Some(session) = self.inner.lock_session().take() else {
            return;
        };

        self.inner.settle.interrupt();
        self.inner.manager.remove_status_listener(&session.listener);
        self.inner.manager.disconnect();
        session.events_task.abort();
        debug!("Start/stop controller paused");
    }

    /// Handle a press of the toggle. Returns the resulting toggle value,
    /// which is the controller's best local belief rather than verified truth.
    pub async fn toggle_pressed(&self, checked: bool) -> bool {
        let _command = self.inner.command_lock.lock().await;

        if checked {
            self.inner.start().await;
        } else {
            self.inner.stop().await;
        }

        let result = self.inner.state() == ToggleState::On;
        if let Some(on_pressed) = &self.inner.on_pressed {
            on_pressed(result);
        }
        result
    }

    pub async fn start_server(&self) -> bool {
        self.toggle_pressed(true).await
    }

    pub async fn stop_server(&self) -> bool {
        self.toggle_pressed(false).await
    }

    pub fn state(&self) -> ToggleState {
        self.inner.state()
    }

    /// Subscribe to toggle state changes.
    pub fn subscribe(&self) -> watch::Receiver<ToggleState> {
        self.inner.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = self.inner.state();
        let indicator = self.inner.lock_indicator().clone();

        ControllerSnapshot {
            state,
            checked: state.is_checked(),
            url: indicator.url(),
            indicator,
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.inner.manager
    }
}

impl ControllerInner {
    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_indicator(&self) -> MutexGuard<'_, Indicator> {
        self.indicator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> ToggleState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ToggleState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("Toggle state {previous:?} -> {state:?}");
        }
    }

    fn show(&self, checked: bool, indicator: Indicator) {
        self.view.set_checked(checked);
        self.view.set_indicator(indicator.clone());
        *self.lock_indicator() = indicator;
    }

    async fn run_events(
        self: Arc<Self>,
        mut status_rx: mpsc::Receiver<Status>,
        mut control_rx: mpsc::UnboundedReceiver<ControllerEvent>,
        control_tx: mpsc::WeakUnboundedSender<ControllerEvent>,
    ) {
        loop {
            // Status events queued before a loss are applied before it.
            let event = tokio::select! {
                biased;
                Some(status) = status_rx.recv() => ControllerEvent::Status(status),
                Some(event) = control_rx.recv() => event,
                else => break,
            };

            let _command = self.command_lock.lock().await;

            match event {
                ControllerEvent::Ready => self.on_connected().await,
                ControllerEvent::Lost | ControllerEvent::Status(Status::Disconnected) => {
                    warn!("Server service disconnected, reconnecting");
                    self.reset_after_failure();
                    if let Some(tx) = control_tx.upgrade() {
                        self.manager.connect(Some(ready_callback(tx)));
                    }
                }
                ControllerEvent::Status(Status::Running) => {
                    if self.state() != ToggleState::On
                        && let Err(e) = self.enter_on(self.preferences.port()).await
                    {
                        warn!("Server running event not applied: {e}");
                    }
                }
                ControllerEvent::Status(Status::Stopped) => {
                    if self.state() != ToggleState::Off {
                        self.set_state(ToggleState::Off);
                        self.show(false, Indicator::Stopped);
                    }
                }
            }
        }
    }

    /// Initialize the toggle from the remote status after (re)connecting.
    async fn on_connected(&self) {
        let status = match self.manager.controller() {
            Ok(controller) => controller.status().await,
            Err(e) => Err(e),
        };

        match status {
            Ok(Status::Running) => {
                info!("Server service ready, server is running");
                if let Err(e) = self.enter_on(self.preferences.port()).await {
                    warn!("Server service ready, state not applied: {e}");
                }
            }
            Ok(status) => {
                info!("Server service ready, server is {status}");
                self.set_state(ToggleState::Off);
                self.show(false, Indicator::Stopped);
            }
            Err(e) => {
                error!("Error resuming the connection to the service: {e}");
                self.reset_after_failure();
            }
        }
    }

    async fn start(&self) {
        let previous = self.state();
        if previous == ToggleState::On {
            debug!("Start requested while already running");
            return;
        }

        self.set_state(ToggleState::TransitioningOn);
        let params = self.preferences.server_parameters();

        match self.start_and_verify(params).await {
            Ok(true) => {}
            Ok(false) => {
                error!("Server did not report running after start");
                self.reset_after_failure();
            }
            Err(e @ ControlError::OperationInterrupted { .. }) => {
                warn!("Warning starting the server: {e}");
                self.set_state(previous);
            }
            Err(e) => {
                error!("Error starting the server: {e}");
                self.reset_after_failure();
            }
        }
    }

    async fn start_and_verify(&self, params: ServerParameters) -> ControlResult<bool> {
        self.settle.ensure_active("start_server")?;
        let controller = self.manager.controller()?;
        let requested_port = params.port;

        self.unless_paused("start_server", controller.start_server(params).await)?;
        self.unless_paused(
            "set_vibrate",
            controller.set_vibrate(self.preferences.vibrate()).await,
        )?;
        self.settle
            .wait(self.settings.settle_delay(), "start_server")
            .await?;

        if self.unless_paused("status", controller.status().await)? != Status::Running {
            return Ok(false);
        }

        self.enter_on(requested_port).await?;
        Ok(true)
    }

    async fn stop(&self) {
        let previous = self.state();
        if previous == ToggleState::Off {
            debug!("Stop requested while already stopped");
            return;
        }

        self.set_state(ToggleState::TransitioningOff);

        match self.stop_and_settle().await {
            Ok(()) => self.set_state(ToggleState::Off),
            Err(e @ ControlError::OperationInterrupted { .. }) => {
                warn!("Warning stopping the server: {e}");
                self.set_state(previous);
            }
            Err(e) => {
                error!("Error stopping the server: {e}");
                self.reset_after_failure();
            }
        }
    }

    /// The stopped indicator goes up as soon as the remote accepts the stop.
    /// From then on the toggle settles at `Off`, even if the settle wait is
    /// cut short.
    async fn stop_and_settle(&self) -> ControlResult<()> {
        self.settle.ensure_active("stop_server")?;
        let controller = self.manager.controller()?;

        self.unless_paused("stop_server", controller.stop_server().await)?;
        self.show(false, Indicator::Stopped);

        if let Err(e) = self
            .settle
            .wait(self.settings.settle_delay(), "stop_server")
            .await
        {
            warn!("Stop accepted but not settled: {e}");
        }
        Ok(())
    }

    /// Replace the outcome of a remote call with `OperationInterrupted` when
    /// the controller was paused while the call was in flight.
    #[track_caller]
    fn unless_paused<T>(
        &self,
        operation: &'static str,
        result: ControlResult<T>,
    ) -> ControlResult<T> {
        self.settle.ensure_active(operation)?;
        result
    }

    /// Move to `On` and publish the URL.
    ///
    /// The port is read back from the remote; `fallback_port` is used if that
    /// read fails. The address is resolved on every call. Fails only when
    /// paused during the read, leaving state and view untouched.
    async fn enter_on(&self, fallback_port: u16) -> ControlResult<()> {
        let current = match self.manager.controller() {
            Ok(controller) => controller.current_params().await,
            Err(e) => Err(e),
        };
        self.settle.ensure_active("current_params")?;

        let port = match current {
            Ok(params) => params.port,
            Err(e) => {
                error!("Error getting the port in use: {e}");
                fallback_port
            }
        };

        let address = self.resolver.local_address().unwrap_or_else(|| {
            warn!("No local address available, publishing unspecified address");
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        });

        self.set_state(ToggleState::On);
        self.show(true, Indicator::Url { address, port });
        info!("Server running at {}", server_url(address, port));
        Ok(())
    }

    fn reset_after_failure(&self) {
        self.set_state(ToggleState::Error);
        self.show(false, Indicator::ConnectionError);
        self.set_state(ToggleState::Off);
    }
}

fn ready_callback(tx: mpsc::UnboundedSender<ControllerEvent>) -> crate::ReadyCallback {
    Box::new(move || {
        if tx.send(ControllerEvent::Ready).is_err() {
            debug!("Start/stop controller stopped, ignoring connection-ready");
        }
    })
}
