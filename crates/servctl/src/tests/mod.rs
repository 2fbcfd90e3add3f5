mod logging;
mod view;

use crate::config::ConnectionSettings;
use crate::{
    Binding, BindingEvent, Indicator, RemoteService, ServerParameters, ServiceBinder,
    StartStopView, Status, StatusListener, TransportError,
};

use std::env;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// RAII guard for environment variables - automatically restores on drop
pub(crate) struct EnvGuard {
    key: &'static str,
    original: Option<String>,
}

impl EnvGuard {
    pub(crate) fn set(key: &'static str, value: &str) -> Self {
        unsafe {
            let original = env::var(key).ok();
            env::set_var(key, value);
            Self { key, original }
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            match &self.original {
                Some(val) => env::set_var(self.key, val),
                None => env::remove_var(self.key),
            }
        }
    }
}

/// Poll `condition` on the (usually paused) runtime clock until it holds.
pub(crate) async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..2000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached in time");
}

/// Bind settings without backoff randomness.
pub(crate) fn quick_bind_settings(max_bind_attempts: u32) -> ConnectionSettings {
    ConnectionSettings {
        max_bind_attempts,
        initial_backoff_ms: 10,
        max_backoff_ms: 100,
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Scripted remote server.
pub(crate) struct FakeRemote {
    status: Mutex<Status>,
    status_after_start: Mutex<Status>,
    last_params: Mutex<Option<ServerParameters>>,
    reported_port: Mutex<Option<u16>>,
    vibrate: Mutex<Option<bool>>,
    call_delay: Mutex<Duration>,
    pub(crate) fail_start: AtomicBool,
    pub(crate) fail_stop: AtomicBool,
    pub(crate) fail_status: AtomicBool,
    pub(crate) fail_current_params: AtomicBool,
    pub(crate) start_calls: AtomicU32,
    pub(crate) stop_calls: AtomicU32,
    pub(crate) status_calls: AtomicU32,
    pub(crate) params_calls: AtomicU32,
}

impl FakeRemote {
    pub(crate) fn new(status: Status) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            status_after_start: Mutex::new(Status::Running),
            last_params: Mutex::new(None),
            reported_port: Mutex::new(None),
            vibrate: Mutex::new(None),
            call_delay: Mutex::new(Duration::ZERO),
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
            fail_current_params: AtomicBool::new(false),
            start_calls: AtomicU32::new(0),
            stop_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            params_calls: AtomicU32::new(0),
        })
    }

    pub(crate) fn set_status(&self, status: Status) {
        *self.status.lock().unwrap() = status;
    }

    pub(crate) fn set_status_after_start(&self, status: Status) {
        *self.status_after_start.lock().unwrap() = status;
    }

    /// Report this port from `current_params` regardless of what was requested.
    pub(crate) fn report_port(&self, port: u16) {
        *self.reported_port.lock().unwrap() = Some(port);
    }

    /// Make `start_server` and `stop_server` take this long to answer.
    pub(crate) fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock().unwrap() = delay;
    }

    async fn answer_after_delay(&self) {
        let delay = *self.call_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub(crate) fn vibrate(&self) -> Option<bool> {
        *self.vibrate.lock().unwrap()
    }

    pub(crate) fn last_params(&self) -> Option<ServerParameters> {
        self.last_params.lock().unwrap().clone()
    }

    pub(crate) fn starts(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> u32 {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteService for FakeRemote {
    async fn start_server(&self, params: ServerParameters) -> Result<(), TransportError> {
        self.answer_after_delay().await;
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(TransportError::EndpointGone);
        }
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some(params);
        let after = *self.status_after_start.lock().unwrap();
        self.set_status(after);
        Ok(())
    }

    async fn stop_server(&self) -> Result<(), TransportError> {
        self.answer_after_delay().await;
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(TransportError::EndpointGone);
        }
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.set_status(Status::Stopped);
        Ok(())
    }

    async fn status(&self) -> Result<Status, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(TransportError::EndpointGone);
        }
        Ok(*self.status.lock().unwrap())
    }

    async fn current_params(&self) -> Result<ServerParameters, TransportError> {
        self.params_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_current_params.load(Ordering::SeqCst) {
            return Err(TransportError::MalformedReply("truncated parameters".into()));
        }
        let mut params = self.last_params().unwrap_or_default();
        if let Some(port) = *self.reported_port.lock().unwrap() {
            params.port = port;
        }
        Ok(params)
    }

    async fn set_vibrate(&self, vibrate: bool) -> Result<(), TransportError> {
        *self.vibrate.lock().unwrap() = Some(vibrate);
        Ok(())
    }
}

/// Binder handing out bindings to a shared `FakeRemote`.
pub(crate) struct FakeBinder {
    pub(crate) remote: Arc<FakeRemote>,
    pub(crate) bind_calls: AtomicU32,
    pub(crate) unbind_calls: AtomicU32,
    failures_remaining: AtomicU32,
    events_tx: Mutex<Option<mpsc::Sender<BindingEvent>>>,
}

impl FakeBinder {
    pub(crate) fn new(remote: Arc<FakeRemote>) -> Arc<Self> {
        Arc::new(Self {
            remote,
            bind_calls: AtomicU32::new(0),
            unbind_calls: AtomicU32::new(0),
            failures_remaining: AtomicU32::new(0),
            events_tx: Mutex::new(None),
        })
    }

    /// Make the next `count` binds fail with a transient error.
    pub(crate) fn fail_next_binds(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub(crate) fn binds(&self) -> u32 {
        self.bind_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn unbinds(&self) -> u32 {
        self.unbind_calls.load(Ordering::SeqCst)
    }

    /// Push an event from the remote side of the current binding.
    pub(crate) async fn push(&self, event: BindingEvent) {
        let tx = self.events_tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    /// Simulate the service process dying: the event feed closes.
    pub(crate) fn kill_service(&self) {
        self.events_tx.lock().unwrap().take();
    }
}

#[async_trait]
impl ServiceBinder for FakeBinder {
    async fn bind(&self) -> Result<Binding, TransportError> {
        self.bind_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::EndpointGone);
        }

        let (tx, rx) = mpsc::channel(16);
        *self.events_tx.lock().unwrap() = Some(tx);

        Ok(Binding {
            service: self.remote.clone(),
            events: rx,
        })
    }

    fn unbind(&self) {
        self.unbind_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ViewUpdate {
    Checked(bool),
    Indicator(Indicator),
}

#[derive(Default)]
pub(crate) struct RecordingView {
    updates: Mutex<Vec<ViewUpdate>>,
}

impl RecordingView {
    pub(crate) fn updates(&self) -> Vec<ViewUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub(crate) fn last_indicator(&self) -> Option<Indicator> {
        self.updates().into_iter().rev().find_map(|u| match u {
            ViewUpdate::Indicator(indicator) => Some(indicator),
            ViewUpdate::Checked(_) => None,
        })
    }

    pub(crate) fn last_checked(&self) -> Option<bool> {
        self.updates().into_iter().rev().find_map(|u| match u {
            ViewUpdate::Checked(checked) => Some(checked),
            ViewUpdate::Indicator(_) => None,
        })
    }

    pub(crate) fn count_indicator(&self, indicator: &Indicator) -> usize {
        self.updates()
            .iter()
            .filter(|u| matches!(u, ViewUpdate::Indicator(i) if i == indicator))
            .count()
    }
}

impl StartStopView for RecordingView {
    fn set_checked(&self, checked: bool) {
        self.updates.lock().unwrap().push(ViewUpdate::Checked(checked));
    }

    fn set_indicator(&self, indicator: Indicator) {
        self.updates
            .lock()
            .unwrap()
            .push(ViewUpdate::Indicator(indicator));
    }
}

#[derive(Default)]
pub(crate) struct RecordingListener {
    received: Mutex<Vec<Status>>,
}

impl RecordingListener {
    pub(crate) fn received(&self) -> Vec<Status> {
        self.received.lock().unwrap().clone()
    }
}

impl StatusListener for RecordingListener {
    fn on_status_changed(&self, status: Status) {
        self.received.lock().unwrap().push(status);
    }
}
