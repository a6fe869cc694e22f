use clap::Args;

fn parse_positive_u64(s: &str) -> Result<u64, String> {
    let value: u64 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if value == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(value)
}

fn parse_positive_usize(s: &str) -> Result<usize, String> {
    let value: usize = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if value == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(value)
}

#[derive(Debug, Clone, Args)]
pub struct PipelineCliArgs {
    /// Name under which every row is stored. One database may hold several chains.
    #[arg(env = "INDEXER_CHAIN_NAME", long, default_value = "gnoland")]
    pub chain_name: String,

    /// The maximum number of blocks in one chunk.
    #[arg(env = "INDEXER_MAX_BLOCK_CHUNK_SIZE", long, default_value = "50", value_parser = parse_positive_u64)]
    pub max_block_chunk_size: u64,

    /// The maximum number of transactions fetched concurrently within a chunk.
    #[arg(env = "INDEXER_MAX_TRANSACTION_CHUNK_SIZE", long, default_value = "100", value_parser = parse_positive_usize)]
    pub max_transaction_chunk_size: usize,

    /// Sleep in milliseconds once live mode has caught up with the chain head.
    #[arg(env = "INDEXER_LIVE_POOLING_MS", long, default_value = "1000")]
    pub live_pooling_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct RetryCliArgs {
    /// Attempts of a bulk address insert.
    #[arg(env = "INDEXER_RETRY_ATTEMPTS", long, default_value = "3")]
    pub retry_attempts: u32,

    /// Extra pause after every this many attempts, 0 disables it.
    #[arg(env = "INDEXER_RETRY_PAUSE_EVERY", long, default_value = "0")]
    pub retry_pause_every: u32,

    /// Length of that extra pause in milliseconds.
    #[arg(env = "INDEXER_RETRY_PAUSE_TIME_MS", long, default_value = "0")]
    pub retry_pause_time_ms: u64,

    /// Backoff unit in milliseconds, attempt `n` waits `n` units.
    #[arg(env = "INDEXER_RETRY_BACKOFF_MS", long, default_value = "200")]
    pub retry_backoff_ms: u64,

    /// Insert addresses one at a time once every bulk attempt failed.
    #[arg(env = "INDEXER_ADDRESS_ONE_BY_ONE_FALLBACK", long, default_value_t = true, action = clap::ArgAction::Set)]
    pub address_one_by_one_fallback: bool,
}
