use std::future::Future;
use std::time::Duration;

use crate::ai::AiError;

use super::classifier::is_retryable;

/// A fixed, ordered sequence of delays between attempts.
///
/// `n` delays allow `n + 1` total attempts: the delay at index `k - 1`
/// is slept before attempt `k + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn from_millis(delays_ms: &[u64]) -> Self {
        Self::new(delays_ms.iter().copied().map(Duration::from_millis).collect())
    }

    /// No retries: a single attempt.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub fn total_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Delay to sleep after a failed `attempt` (1-based), if any remain.
    pub fn delay_after(&self, attempt: usize) -> Option<Duration> {
        self.delays.get(attempt - 1).copied()
    }
}

/// Notification sent to the observer before each retry wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryNotice {
    /// The attempt that just failed (1-based).
    pub attempt: usize,
    /// Total attempts the schedule allows.
    pub total_attempts: usize,
    /// How long the scheduler is about to wait.
    pub delay: Duration,
}

/// Receives per-retry feedback; implemented by the presentation layer.
pub trait RetryObserver: Send + Sync {
    fn on_retry(&self, notice: &RetryNotice);
}

/// Observer that discards all notifications.
pub struct NoopObserver;

impl RetryObserver for NoopObserver {
    fn on_retry(&self, _notice: &RetryNotice) {}
}

/// Terminal failure of a retried operation.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// Every allowed attempt failed with a transient error.
    #[error("All {attempts} attempts failed: {source}")]
    Exhausted { attempts: usize, source: AiError },

    /// A non-retryable error ended the operation on the spot.
    #[error("{source}")]
    Permanent { source: AiError },
}

impl RetryError {
    pub fn source_error(&self) -> &AiError {
        match self {
            Self::Exhausted { source, .. } => source,
            Self::Permanent { source } => source,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Drive one async operation through a delay schedule.
///
/// The operation receives the 1-based attempt number. On a retryable
/// failure with attempts remaining the observer is notified, the
/// scheduled delay is slept, and the operation is re-invoked; attempts
/// never overlap. A non-retryable failure surfaces immediately.
pub async fn run_with_retry<T, F, Fut>(
    schedule: &RetrySchedule,
    observer: &dyn RetryObserver,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let total_attempts = schedule.total_attempts();
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if is_retryable(&error) => match schedule.delay_after(attempt) {
                Some(delay) => {
                    observer.on_retry(&RetryNotice {
                        attempt,
                        total_attempts,
                        delay,
                    });
                    tracing::warn!(
                        attempt,
                        total_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    tracing::warn!(attempts = total_attempts, error = %error, "Attempts exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: total_attempts,
                        source: error,
                    });
                }
            },
            Err(error) => {
                tracing::warn!(attempt, error = %error, "Permanent failure, not retrying");
                return Err(RetryError::Permanent { source: error });
            }
        }
    }
}
