//! Retry with linearly increasing backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Result of running an operation under a retry policy.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success { value: T, attempts: u32 },
    /// The last error seen, and how many attempts were made.
    Exhausted { error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryOutcome::Success { value, .. } => Ok(value),
            RetryOutcome::Exhausted { error, .. } => Err(error),
        }
    }
}

/// Attempt ceiling plus the base of a linear backoff: the wait before
/// attempt `n` is `base_delay × (n - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Wait before the 1-based `attempt`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.saturating_sub(1)
    }

    /// Run `op` under this policy. See [`retry_with_backoff`].
    pub async fn run<T, E, F, Fut, R>(&self, is_retryable: R, op: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        retry_with_backoff(self.max_attempts, |n| self.delay_before(n), is_retryable, op).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_BASE_DELAY)
    }
}

/// Call `op` with attempt numbers `1..=max_attempts` until it succeeds, it
/// fails with an error `is_retryable` rejects, or the ceiling is reached.
///
/// `backoff(n)` is the wait before attempt `n` (called for `n >= 2`).
/// Failures are reported as a value, never by panicking or unwinding.
pub async fn retry_with_backoff<T, E, F, Fut, B, R>(
    max_attempts: u32,
    backoff: B,
    is_retryable: R,
    mut op: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    B: Fn(u32) -> Duration,
    R: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                return RetryOutcome::Success {
                    value,
                    attempts: attempt,
                };
            }
            Err(error) if attempt >= max_attempts || !is_retryable(&error) => {
                return RetryOutcome::Exhausted {
                    error,
                    attempts: attempt,
                };
            }
            Err(error) => {
                let delay = backoff(attempt + 1);
                warn!(
                    attempt,
                    max_attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    %error,
                    "attempt failed"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
