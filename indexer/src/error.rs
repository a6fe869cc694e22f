use indexer_tx_decoder::DecodeError;
use thiserror::Error;

use crate::core::client::database::DatabaseError;
use crate::core::client::rpc::{RpcError, RpcTarget};
use crate::types::AddressRole;

/// Result type for indexer operations
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Error types for the indexer
#[derive(Error, Debug)]
pub enum IndexerError {
    /// RPC failure, carries the requested height or hash
    #[error("Transport error: {0}")]
    Transport(RpcError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid input, e.g. `from > to` in a range request
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] DatabaseError),

    /// Only surfaced on the non-blocking RPC path
    #[error("Rate limit exhausted for {0}")]
    RateLimitExhausted(RpcTarget),

    /// An address needed by a row has no surrogate id
    #[error("Unresolved {role} address: {address}")]
    UnresolvedAddress { address: String, role: AddressRole },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Setup Command Error: {0}")]
    Setup(String),

    #[error("Indexer Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl IndexerError {
    /// Short label for metrics attributes
    pub fn kind(&self) -> &'static str {
        match self {
            IndexerError::RateLimitExhausted(_) => "rate_limit_exhausted",
            IndexerError::Transport(_) => "transport",
            IndexerError::Decode(_) => "decode",
            IndexerError::Validation(_) => "validation",
            IndexerError::Persistence(_) => "persistence",
            IndexerError::UnresolvedAddress { .. } => "unresolved_address",
            IndexerError::Config(_) => "config",
            IndexerError::Setup(_) => "setup",
            IndexerError::Other(_) => "other",
        }
    }
}

impl From<RpcError> for IndexerError {
    fn from(error: RpcError) -> Self {
        match error {
            RpcError::RateLimitExhausted { target } => IndexerError::RateLimitExhausted(target),
            other => IndexerError::Transport(other),
        }
    }
}
