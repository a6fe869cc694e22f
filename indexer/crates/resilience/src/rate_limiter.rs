//! Token bucket admission control for outbound RPC calls.
//!
//! The bucket starts full with `capacity` tokens and a background task puts tokens back at a rate
//! of `capacity` per `window`. When `window / capacity` is shorter than [`MIN_REFILL_PERIOD`] the
//! task ticks at that floor and returns several tokens per tick instead. A refill never grows the
//! bucket past `capacity`. Tokens are the permits of a [`Semaphore`]: taking a token forgets the
//! permit, refilling adds it back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest refill cadence, so a huge capacity over a tiny window does not spin the refill task.
pub const MIN_REFILL_PERIOD: Duration = Duration::from_millis(1);

/// Instantaneous view of the bucket. Not a strict snapshot under concurrent callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterStatus {
    pub available: usize,
    pub capacity: usize,
    pub is_empty: bool,
    pub is_full: bool,
}

#[derive(Debug)]
pub struct RateLimiter {
    tokens: Arc<Semaphore>,
    capacity: usize,
    refill_period: Duration,
    refill_amount: usize,
    refill_stop: CancellationToken,
}

impl RateLimiter {
    /// Create a full bucket and start its refill task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(capacity: usize, window: Duration) -> Self {
        let capacity = capacity.max(1);
        let divisor = u32::try_from(capacity).unwrap_or(u32::MAX);
        let refill_period = (window / divisor).max(MIN_REFILL_PERIOD);
        let refill_amount = tokens_per_tick(capacity, window, refill_period);

        let tokens = Arc::new(Semaphore::new(capacity));
        let refill_stop = CancellationToken::new();

        tokio::spawn(refill_loop(Arc::clone(&tokens), capacity, refill_period, refill_amount, refill_stop.clone()));
        tracing::debug!(
            capacity,
            refill_period_ms = refill_period.as_millis() as u64,
            refill_amount,
            "Rate limiter started"
        );

        Self { tokens, capacity, refill_period, refill_amount, refill_stop }
    }

    /// Take a token if one is available, without waiting.
    pub fn allow(&self) -> bool {
        match self.tokens.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Wait until a token is available and take it.
    pub async fn wait(&self) {
        // The semaphore is never closed, acquisition cannot fail.
        if let Ok(permit) = self.tokens.acquire().await {
            permit.forget();
        }
    }

    /// Stop the refill cadence. Tokens already in the bucket stay usable.
    pub fn close(&self) {
        self.refill_stop.cancel();
    }

    pub fn status(&self) -> RateLimiterStatus {
        let available = self.tokens.available_permits().min(self.capacity);
        RateLimiterStatus {
            available,
            capacity: self.capacity,
            is_empty: available == 0,
            is_full: available == self.capacity,
        }
    }

    pub fn refill_period(&self) -> Duration {
        self.refill_period
    }

    /// Tokens put back on every refill tick.
    pub fn refill_amount(&self) -> usize {
        self.refill_amount
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.refill_stop.cancel();
    }
}

/// `ceil(capacity * period / window)`, so ticking at `period` keeps up with `capacity` per `window`.
fn tokens_per_tick(capacity: usize, window: Duration, period: Duration) -> usize {
    let window = window.as_nanos();
    if window == 0 {
        return capacity;
    }
    let owed = (capacity as u128 * period.as_nanos()).div_ceil(window);
    usize::try_from(owed).unwrap_or(capacity).clamp(1, capacity)
}

async fn refill_loop(
    tokens: Arc<Semaphore>,
    capacity: usize,
    period: Duration,
    amount: usize,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                // Only this task adds permits, so the check cannot race into overflow.
                let room = capacity.saturating_sub(tokens.available_permits());
                if room > 0 {
                    tokens.add_permits(amount.min(room));
                }
            }
        }
    }
    tracing::debug!("Rate limiter refill stopped");
}
