use crate::TransportError;
use crate::config::ConnectionSettings;

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Backoff policy for bind attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add jitter to prevent synchronized retries
    pub jitter: bool,
}

impl From<&ConnectionSettings> for RetryPolicy {
    fn from(settings: &ConnectionSettings) -> Self {
        Self {
            max_attempts: settings.max_bind_attempts.max(1),
            initial_delay: settings.initial_backoff(),
            max_delay: settings.max_backoff(),
            backoff_multiplier: settings.backoff_multiplier,
            jitter: settings.jitter,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ConnectionSettings::default())
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
///
/// On failure returns the last error and the number of attempts made.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, (TransportError, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempts = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    info!("{operation_name} succeeded after {attempts} attempts");
                }
                return Ok(result);
            }
            Err(e) => {
                if !e.is_transient() || attempts >= policy.max_attempts {
                    warn!("{operation_name} failed after {attempts} attempts: {e}");
                    return Err((e, attempts));
                }

                let actual_delay = if policy.jitter {
                    let jitter_factor = 0.5 + rand::random::<f64>();
                    Duration::from_secs_f64(delay.as_secs_f64() * jitter_factor)
                } else {
                    delay
                };

                debug!(
                    "{operation_name} attempt {attempts} failed: {e}. Retrying in {actual_delay:?}"
                );

                sleep(actual_delay).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * policy.backoff_multiplier)
                        .min(policy.max_delay.as_secs_f64()),
                );
            }
        }
    }
}
