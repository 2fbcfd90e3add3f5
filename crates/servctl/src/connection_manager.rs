//! Bind/unbind lifecycle with status fan-out.
//!
//! Reconnection after a lost binding is the listeners' job: the manager
//! broadcasts a synthesized `Status::Disconnected` and stays passive until
//! someone calls `connect()` again.

use crate::config::ConnectionSettings;
use crate::retry::{RetryPolicy, with_retry};
use crate::{
    BindingEvent, ConnectionState, ControlError, ControlResult, ListenerRegistry, ServiceBinder,
    ServiceController, Status, StatusListener,
};

use std::cell::Cell;
use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use error_location::ErrorLocation;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Invoked once the binding is ready.
pub type ReadyCallback = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Owns the binding to the remote service.
///
/// Cheap to clone; clones share the same binding and listener set.
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    binder: Arc<dyn ServiceBinder>,
    listeners: ListenerRegistry,
    retry: RetryPolicy,
    runtime: Handle,
    link: Mutex<Link>,
    /// Serializes listener delivery against `disconnect()`
    dispatch_lock: Mutex<()>,
}

struct Link {
    state: ConnectionState,
    /// Bumped by `disconnect()`; events tagged with an older epoch are dropped
    epoch: u64,
    /// Identifies the bind attempt (and resulting binding) currently owned
    attempt: u64,
    controller: Option<ServiceController>,
    pending: Vec<ReadyCallback>,
    connect_task: Option<JoinHandle<()>>,
    pump_task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create a manager bound to the current Tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn new(binder: Arc<dyn ServiceBinder>, settings: &ConnectionSettings) -> Self {
        Self::with_runtime(binder, settings, Handle::current())
    }

    pub fn with_runtime(
        binder: Arc<dyn ServiceBinder>,
        settings: &ConnectionSettings,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                binder,
                listeners: ListenerRegistry::new(),
                retry: RetryPolicy::from(settings),
                runtime,
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    epoch: 0,
                    attempt: 0,
                    controller: None,
                    pending: Vec::new(),
                    connect_task: None,
                    pump_task: None,
                }),
                dispatch_lock: Mutex::new(()),
            }),
        }
    }

    /// Start connecting, or join the attempt already in flight.
    ///
    /// Never blocks. `on_ready` runs exactly once on a runtime worker after the
    /// binding is established; if the manager is already connected it is
    /// scheduled immediately. If every bind attempt fails the callback is
    /// dropped without running.
    pub fn connect(&self, on_ready: Option<ReadyCallback>) {
        let mut link = self.inner.lock_link();

        match link.state {
            ConnectionState::Connected => {
                drop(link);
                if let Some(callback) = on_ready {
                    self.inner.runtime.spawn(async move { callback() });
                }
            }
            ConnectionState::Connecting => {
                debug!("Connect requested while a bind is in flight");
                link.pending.extend(on_ready);
            }
            ConnectionState::Disconnected => {
                link.state = ConnectionState::Connecting;
                link.attempt += 1;
                link.pending.extend(on_ready);

                let attempt = link.attempt;
                let inner = Arc::clone(&self.inner);
                info!("Connecting to server service (attempt {attempt})");
                link.connect_task = Some(self.inner.runtime.spawn(inner.establish(attempt)));
            }
        }
    }

    /// Tear down the binding.
    ///
    /// After return no listener of this manager receives further events and
    /// every previously handed out `ServiceController` fails with
    /// `ControlError::NotConnected`. In-flight remote calls are not aborted.
    pub fn disconnect(&self) {
        // A listener calling disconnect() already runs under the dispatch lock.
        let _serial = (!DISPATCHING.with(Cell::get)).then(|| self.inner.lock_dispatch());

        let previous = {
            let mut link = self.inner.lock_link();
            let previous = link.state;

            link.epoch += 1;
            link.attempt += 1;
            link.state = ConnectionState::Disconnected;
            link.pending.clear();
            if let Some(controller) = link.controller.take() {
                controller.invalidate();
            }
            if let Some(task) = link.connect_task.take() {
                task.abort();
            }
            if let Some(task) = link.pump_task.take() {
                task.abort();
            }
            previous
        };

        if previous != ConnectionState::Disconnected {
            self.inner.binder.unbind();
            info!("Disconnected from server service");
        }
    }

    /// Proxy for the live binding.
    pub fn controller(&self) -> ControlResult<ServiceController> {
        self.inner
            .lock_link()
            .controller
            .clone()
            .ok_or_else(|| ControlError::NotConnected {
                operation: "controller",
                location: ErrorLocation::from(Location::caller()),
            })
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock_link().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Register for status changes. Registering the same handle twice is a no-op.
    pub fn add_status_listener(&self, listener: &Arc<dyn StatusListener>) {
        self.inner.listeners.add(listener);
    }

    /// Unregister. Unknown handles are ignored.
    pub fn remove_status_listener(&self, listener: &Arc<dyn StatusListener>) {
        self.inner.listeners.remove(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl Clone for ConnectionManager {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ManagerInner {
    fn lock_link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn establish(self: Arc<Self>, attempt: u64) {
        let result = with_retry(&self.retry, "Bind to server service", || {
            self.binder.bind()
        })
        .await;

        match result {
            Ok(binding) => {
                let callbacks = {
                    let mut link = self.lock_link();
                    if link.attempt != attempt || link.state != ConnectionState::Connecting {
                        debug!("Discarding binding from superseded attempt {attempt}");
                        return;
                    }

                    link.state = ConnectionState::Connected;
                    link.controller = Some(ServiceController::new(binding.service));
                    link.connect_task = None;

                    let epoch = link.epoch;
                    let pump = Arc::clone(&self).pump(binding.events, attempt, epoch);
                    link.pump_task = Some(self.runtime.spawn(pump));

                    std::mem::take(&mut link.pending)
                };

                info!("Connected to server service");
                for callback in callbacks {
                    callback();
                }
            }
            Err((source, attempts)) => {
                let error = ControlError::BindFailed {
                    attempts,
                    source,
                    location: ErrorLocation::from(Location::caller()),
                };
                error!("{error}");

                let mut link = self.lock_link();
                if link.attempt == attempt {
                    link.state = ConnectionState::Disconnected;
                    link.connect_task = None;
                    link.pending.clear();
                }
            }
        }
    }

    async fn pump(
        self: Arc<Self>,
        mut events: mpsc::Receiver<BindingEvent>,
        attempt: u64,
        epoch: u64,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                BindingEvent::StatusChanged(Status::Disconnected) => {
                    warn!("Ignoring Disconnected status pushed by the remote");
                }
                BindingEvent::StatusChanged(status) => self.dispatch(epoch, status),
                BindingEvent::ServiceLost => break,
            }
        }

        self.on_service_lost(attempt, epoch);
    }

    fn on_service_lost(&self, attempt: u64, epoch: u64) {
        {
            let mut link = self.lock_link();
            if link.attempt != attempt || link.state != ConnectionState::Connected {
                return;
            }

            link.state = ConnectionState::Disconnected;
            link.pump_task = None;
            if let Some(controller) = link.controller.take() {
                controller.invalidate();
            }
        }

        warn!("Server service connection lost");
        self.binder.unbind();
        self.dispatch(epoch, Status::Disconnected);
    }

    /// Deliver `status` to a snapshot of the listeners, in registration order.
    fn dispatch(&self, epoch: u64, status: Status) {
        let _scope = DispatchScope::enter();
        let _serial = self.lock_dispatch();

        let listeners = self.listeners.snapshot();
        debug!("Dispatching {status} to {} listeners", listeners.len());

        for listener in listeners {
            if self.lock_link().epoch != epoch {
                debug!("Dropping {status} event after disconnect");
                return;
            }
            listener.on_status_changed(status);
        }
    }
}

/// Marks the current thread as delivering listener events.
struct DispatchScope {
    previous: bool,
}

impl DispatchScope {
    fn enter() -> Self {
        Self {
            previous: DISPATCHING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(self.previous));
    }
}
