use crate::{ControlError, ControlResult};

use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

/// Interruptible fixed delay used after start/stop commands.
///
/// The interrupt is a level, not an edge: once `interrupt` is called every
/// current and future `wait` or `ensure_active` fails with
/// `ControlError::OperationInterrupted` until `reset`.
#[derive(Clone)]
pub struct SettleTimer {
    interrupted_tx: watch::Sender<bool>,
}

impl SettleTimer {
    pub fn new() -> Self {
        let (interrupted_tx, _) = watch::channel(false);
        Self { interrupted_tx }
    }

    /// Sleep for `delay` unless interrupted first.
    pub async fn wait(&self, delay: Duration, operation: &'static str) -> ControlResult<()> {
        let mut interrupted_rx = self.interrupted_tx.subscribe();
        self.ensure_active(operation)?;

        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = interrupted_rx.wait_for(|interrupted| *interrupted) => {
                debug!("Settle wait after {operation} interrupted");
                Err(ControlError::interrupted(operation))
            }
        }
    }

    /// Fail with `OperationInterrupted` if an interrupt is in effect.
    #[track_caller]
    pub fn ensure_active(&self, operation: &'static str) -> ControlResult<()> {
        if self.is_interrupted() {
            Err(ControlError::interrupted(operation))
        } else {
            Ok(())
        }
    }

    /// Cut short every wait in progress and refuse new ones until `reset`.
    pub fn interrupt(&self) {
        self.interrupted_tx.send_replace(true);
    }

    /// Clear a previous interrupt.
    pub fn reset(&self) {
        self.interrupted_tx.send_replace(false);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.interrupted_tx.borrow()
    }

    /// Number of waits currently in progress.
    pub fn pending(&self) -> usize {
        self.interrupted_tx.receiver_count()
    }
}

impl Default for SettleTimer {
    fn default() -> Self {
        Self::new()
    }
}
