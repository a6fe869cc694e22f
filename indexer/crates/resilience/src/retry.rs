//! Bounded retry with linear backoff and an optional coarse pause.
//!
//! Attempt `n` that fails is followed by a sleep of `backoff_base * n`, and every `pause_every`
//! failed attempts an extra `pause_time` is added on top, to ride out outage-scale disruptions.
//! Nothing is slept after the last attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryParams {
    /// Total number of attempts. Zero is treated as one.
    pub retry_amount: u32,
    /// Add `pause_time` after every `pause_every` failed attempts. Zero disables the pause.
    pub pause_every: u32,
    pub pause_time: Duration,
    pub backoff_base: Duration,
}

impl RetryParams {
    /// A single attempt, no sleeping.
    pub const fn once() -> Self {
        Self { retry_amount: 1, pause_every: 0, pause_time: Duration::ZERO, backoff_base: Duration::ZERO }
    }

    /// Delay to sleep after failed attempt `attempt` (1-based), when more attempts remain.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let mut delay = self.backoff_base.saturating_mul(attempt);
        if self.pause_every > 0 && attempt % self.pause_every == 0 {
            delay = delay.saturating_add(self.pause_time);
        }
        delay
    }

    fn attempts(&self) -> u32 {
        self.retry_amount.max(1)
    }
}

impl Default for RetryParams {
    fn default() -> Self {
        Self {
            retry_amount: 3,
            pause_every: 0,
            pause_time: Duration::ZERO,
            backoff_base: Duration::from_millis(200),
        }
    }
}

/// Outcome of one retry sequence.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryResult<T, E> {
    Success(T),
    Failure { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::Failure { error, .. } => Err(error),
        }
    }
}

/// Run `f` until it succeeds or `params.retry_amount` attempts have failed.
///
/// `f` receives the 1-based attempt number.
pub async fn retry_query<T, E, F, Fut>(params: RetryParams, f: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_query_if(params, f, |_| true).await
}

/// [`retry_query`] that gives up at the first error `retryable` rejects.
pub async fn retry_query_if<T, E, F, Fut, P>(params: RetryParams, mut f: F, retryable: P) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let attempts = params.attempts();
    let mut attempt = 1;
    loop {
        match f(attempt).await {
            Ok(value) => return RetryResult::Success(value),
            Err(error) if attempt >= attempts => return RetryResult::Failure { error, attempts: attempt },
            Err(error) if !retryable(&error) => {
                tracing::debug!(attempt, error = %error, "Error is not retryable, giving up");
                return RetryResult::Failure { error, attempts: attempt };
            }
            Err(error) => {
                let delay = params.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Spawn [`retry_query`] and report its outcome through exactly one of the callbacks.
pub fn retry_query_detached<T, E, F, Fut, S, L>(
    params: RetryParams,
    f: F,
    on_success: S,
    on_failure: L,
) -> JoinHandle<()>
where
    F: FnMut(u32) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
    S: FnOnce(T) + Send + 'static,
    L: FnOnce(E, u32) + Send + 'static,
{
    tokio::spawn(async move {
        match retry_query(params, f).await {
            RetryResult::Success(value) => on_success(value),
            RetryResult::Failure { error, attempts } => on_failure(error, attempts),
        }
    })
}
