use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Exponential Backoff Retry Strategy
// ============================================================================
//
// Used by the notification dispatcher. Only errors that report themselves as
// transient are retried; anything else fails on the first attempt.
//
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay to wait after the attempt that just failed.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let scaled = (current.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(scaled).min(self.max_delay)
    }
}

/// Check if an error is transient (should retry) or permanent (should not retry)
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success { value: T, attempts: u32 },
    /// Every attempt failed with a transient error
    Exhausted { error: E, attempts: u32 },
    /// A permanent error stopped the loop early
    PermanentFailure { error: E, attempts: u32 },
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
///
/// The closure receives the 1-based attempt number.
pub async fn retry_on_transient<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return RetryResult::Success {
                    value,
                    attempts: attempt,
                };
            }
            Err(error) if !error.is_transient() => {
                tracing::warn!(attempt, error = %error, "Permanent failure, not retrying");
                return RetryResult::PermanentFailure {
                    error,
                    attempts: attempt,
                };
            }
            Err(error) if attempt >= config.max_attempts => {
                tracing::warn!(attempt, error = %error, "Operation failed after all retries");
                return RetryResult::Exhausted {
                    error,
                    attempts: attempt,
                };
            }
            Err(error) => {
                tracing::debug!(
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying after delay"
                );
                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
