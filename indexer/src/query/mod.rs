//! Fan-out/fan-in retrieval of blocks and transactions.
//!
//! One fetch per requested height or hash runs concurrently, each taking its own rate-limiter
//! token per attempt. Every request yields exactly one [`FetchResult`], so a failed item stays
//! visible to the caller instead of being confused with a legitimately missing one. Only
//! transport failures are retried; a node error or a malformed answer would repeat as is.

use futures::{stream, StreamExt};
use indexer_resilience::{retry_query_if, RetryParams};
use tracing::{debug, warn};

use crate::core::client::rpc::{RateLimitedRpc, RpcError};
use crate::error::{IndexerError, IndexerResult};
use crate::types::{Block, Transaction};
use crate::utils::metrics::INDEXER_METRICS;

pub type FetchResult<T> = Result<T, RpcError>;

#[derive(Clone)]
pub struct QueryOperator {
    rpc: RateLimitedRpc,
    retry: RetryParams,
}

impl QueryOperator {
    /// `retry` applies per item. `RetryParams::once()` disables retrying.
    pub fn new(rpc: RateLimitedRpc, retry: RetryParams) -> Self {
        Self { rpc, retry }
    }

    /// Fetch every block in `[from, to]`. Results arrive in completion order.
    pub async fn get_from_to_blocks(&self, from: u64, to: u64) -> IndexerResult<Vec<FetchResult<Block>>> {
        if from > to {
            return Err(IndexerError::Validation(format!("invalid block range: from {from} > to {to}")));
        }
        let count = usize::try_from(to - from + 1)
            .map_err(|_| IndexerError::Validation(format!("block range {from}..={to} is too large")))?;

        debug!(from, to, "Fetching blocks");
        let results: Vec<FetchResult<Block>> = stream::iter(from..=to)
            .map(|height| {
                let rpc = &self.rpc;
                retry_query_if(self.retry, move |_| rpc.get_block(height), RpcError::is_retryable)
            })
            .buffer_unordered(count)
            .map(|outcome| outcome.into_result())
            .collect()
            .await;
        Ok(results)
    }

    /// Fetch every transaction in `hashes`. Results arrive in completion order.
    pub async fn get_transactions(&self, hashes: &[String]) -> Vec<FetchResult<Transaction>> {
        if hashes.is_empty() {
            return Vec::new();
        }
        debug!(count = hashes.len(), "Fetching transactions");
        let rpc = &self.rpc;
        let fetches: Vec<_> = hashes
            .iter()
            .map(|hash| retry_query_if(self.retry, move |_| rpc.get_tx(hash), RpcError::is_retryable))
            .collect();
        stream::iter(fetches)
            .buffer_unordered(hashes.len())
            .map(|outcome| outcome.into_result())
            .collect()
            .await
    }

    pub async fn get_latest_block_height(&self) -> Result<u64, RpcError> {
        retry_query_if(self.retry, move |_| self.rpc.get_latest_block_height(), RpcError::is_retryable)
            .await
            .into_result()
    }
}

/// Keep the successful fetches, log and count the failed ones.
pub fn successful<T>(results: Vec<FetchResult<T>>) -> Vec<T> {
    let mut values = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(e) => {
                warn!(target_item = %e.target(), error = %e, "Dropping item after failed fetch");
                INDEXER_METRICS.rpc_errors.add(1, &[opentelemetry::KeyValue::new("error_type", e.error_type())]);
            }
        }
    }
    values
}
