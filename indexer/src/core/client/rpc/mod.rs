pub mod error;
pub mod http;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use indexer_resilience::RateLimiter;

use crate::types::{Block, Transaction};
pub use error::{RpcError, RpcTarget};
pub use http::HttpRpcClient;

/// Trait defining the chain RPC operations the indexer consumes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// get_block - Fetch the block at `height`
    async fn get_block(&self, height: u64) -> Result<Block, RpcError>;
    /// get_tx - Fetch a transaction by its base64 hash
    async fn get_tx(&self, hash: &str) -> Result<Transaction, RpcError>;
    /// get_latest_block_height - Height of the chain head
    async fn get_latest_block_height(&self) -> Result<u64, RpcError>;
    /// health - Ok when the node answers
    async fn health(&self) -> Result<(), RpcError>;
}

/// [`RpcClient`] behind a token bucket.
///
/// Every call takes one token. The plain methods wait for a token, the `try_` methods fail with
/// [`RpcError::RateLimitExhausted`] when the bucket is empty.
#[derive(Clone)]
pub struct RateLimitedRpc {
    inner: Arc<dyn RpcClient>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedRpc {
    pub fn new(inner: Arc<dyn RpcClient>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    fn admit(&self, target: impl FnOnce() -> RpcTarget) -> Result<(), RpcError> {
        if self.limiter.allow() {
            Ok(())
        } else {
            Err(RpcError::RateLimitExhausted { target: target() })
        }
    }

    pub async fn get_block(&self, height: u64) -> Result<Block, RpcError> {
        self.limiter.wait().await;
        self.inner.get_block(height).await
    }

    pub async fn try_get_block(&self, height: u64) -> Result<Block, RpcError> {
        self.admit(|| RpcTarget::Height(height))?;
        self.inner.get_block(height).await
    }

    pub async fn get_tx(&self, hash: &str) -> Result<Transaction, RpcError> {
        self.limiter.wait().await;
        self.inner.get_tx(hash).await
    }

    pub async fn try_get_tx(&self, hash: &str) -> Result<Transaction, RpcError> {
        self.admit(|| RpcTarget::Hash(hash.to_string()))?;
        self.inner.get_tx(hash).await
    }

    pub async fn get_latest_block_height(&self) -> Result<u64, RpcError> {
        self.limiter.wait().await;
        self.inner.get_latest_block_height().await
    }

    pub async fn try_get_latest_block_height(&self) -> Result<u64, RpcError> {
        self.admit(|| RpcTarget::Latest)?;
        self.inner.get_latest_block_height().await
    }

    pub async fn health(&self) -> Result<(), RpcError> {
        self.limiter.wait().await;
        self.inner.health().await
    }

    pub async fn try_health(&self) -> Result<(), RpcError> {
        self.admit(|| RpcTarget::Health)?;
        self.inner.health().await
    }
}
