//! Validated runtime configuration built from the parsed command line.

use std::time::Duration;

use indexer_resilience::RetryParams;
use url::Url;

use crate::cli::{RetryCliArgs, RunArgs};
use crate::error::IndexerError;
use crate::orchestrator::OrchestratorConfig;
use crate::processor::SolverSettings;

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: Url,
    pub timeout: Duration,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub retry: RetryParams,
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub rpc: RpcConfig,
    pub orchestrator: OrchestratorConfig,
    pub solver: SolverSettings,
}

impl TryFrom<&RunArgs> for IndexerConfig {
    type Error = IndexerError;

    fn try_from(args: &RunArgs) -> Result<Self, Self::Error> {
        let pipeline = &args.pipeline_args;
        let rpc = &args.rpc_args;

        if pipeline.chain_name.trim().is_empty() {
            return Err(IndexerError::Config("chain name must not be empty".to_string()));
        }
        if pipeline.max_block_chunk_size == 0 || pipeline.max_transaction_chunk_size == 0 {
            return Err(IndexerError::Config("chunk sizes must be greater than 0".to_string()));
        }
        if rpc.rpc_rate_limit == 0 || rpc.rpc_rate_window_ms == 0 {
            return Err(IndexerError::Config("rate limit and window must be greater than 0".to_string()));
        }
        if args.database_args.database_max_connections == 0 {
            return Err(IndexerError::Config("database pool needs at least one connection".to_string()));
        }

        Ok(Self {
            database_url: args.database_args.database_url.clone(),
            database_max_connections: args.database_args.database_max_connections,
            rpc: RpcConfig {
                url: rpc.rpc_url.clone(),
                timeout: Duration::from_secs(rpc.rpc_timeout_secs),
                rate_limit: rpc.rpc_rate_limit,
                rate_window: Duration::from_millis(rpc.rpc_rate_window_ms),
                retry: RetryParams {
                    retry_amount: rpc.rpc_fetch_attempts,
                    pause_every: 0,
                    pause_time: Duration::ZERO,
                    backoff_base: Duration::from_millis(args.retry_args.retry_backoff_ms),
                },
            },
            orchestrator: OrchestratorConfig {
                chain_name: pipeline.chain_name.clone(),
                max_block_chunk_size: pipeline.max_block_chunk_size,
                max_transaction_chunk_size: pipeline.max_transaction_chunk_size,
                live_pooling: Duration::from_millis(pipeline.live_pooling_ms),
            },
            solver: SolverSettings {
                retry: retry_params(&args.retry_args),
                allow_one_by_one_fallback: args.retry_args.address_one_by_one_fallback,
            },
        })
    }
}

fn retry_params(args: &RetryCliArgs) -> RetryParams {
    RetryParams {
        retry_amount: args.retry_attempts,
        pause_every: args.retry_pause_every,
        pause_time: Duration::from_millis(args.retry_pause_time_ms),
        backoff_base: Duration::from_millis(args.retry_backoff_ms),
    }
}
