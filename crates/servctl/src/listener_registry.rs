use crate::Status;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Receives every status transition, including the synthesized `Disconnected`.
///
/// Invoked on a runtime worker thread. Implementations that own
/// single-threaded state must hand the event off (e.g. over a channel)
/// instead of mutating that state in place.
pub trait StatusListener: Send + Sync {
    fn on_status_changed(&self, status: Status);
}

impl<F> StatusListener for F
where
    F: Fn(Status) + Send + Sync,
{
    fn on_status_changed(&self, status: Status) {
        self(status)
    }
}

/// Set of registered status listeners, keyed by handle identity.
pub struct ListenerRegistry {
    inner: Arc<Mutex<Vec<Arc<dyn StatusListener>>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Arc<dyn StatusListener>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener. Returns false if that handle was already present.
    pub fn add(&self, listener: &Arc<dyn StatusListener>) -> bool {
        let mut listeners = self.listeners();
        if listeners.iter().any(|l| same_listener(l, listener)) {
            return false;
        }
        listeners.push(Arc::clone(listener));
        debug!("Status listener registered ({} total)", listeners.len());
        true
    }

    /// Unregister a listener. Unknown handles are ignored.
    pub fn remove(&self, listener: &Arc<dyn StatusListener>) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        let removed = listeners.len() != before;
        if removed {
            debug!("Status listener removed ({} remaining)", listeners.len());
        }
        removed
    }

    /// Copy of the current registrations, safe to iterate while listeners
    /// add or remove themselves.
    pub fn snapshot(&self) -> Vec<Arc<dyn StatusListener>> {
        self.listeners().clone()
    }

    pub fn len(&self) -> usize {
        self.listeners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners().is_empty()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ListenerRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn same_listener(a: &Arc<dyn StatusListener>, b: &Arc<dyn StatusListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
