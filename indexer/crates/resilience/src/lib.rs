//! Resilience primitives shared by the indexer's outbound calls.
//!
//! - **Rate limiting**: a token bucket that throttles RPC calls to a fixed budget per window
//! - **Retry**: bounded retry with linear backoff and a coarse pause for prolonged outages
//!
//! # Example
//!
//! ```rust,ignore
//! use indexer_resilience::{retry_query, RateLimiter, RetryParams};
//! use std::time::Duration;
//!
//! let limiter = RateLimiter::new(100, Duration::from_secs(1));
//! let outcome = retry_query(RetryParams::default(), |_attempt| async {
//!     limiter.wait().await;
//!     fetch_block(42).await
//! })
//! .await;
//! ```

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{RateLimiter, RateLimiterStatus};
pub use retry::{retry_query, retry_query_detached, retry_query_if, RetryParams, RetryResult};
