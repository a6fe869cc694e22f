use clap::Args;
use url::Url;

/// Parameters of the node RPC endpoint and its request budget.
#[derive(Debug, Clone, Args)]
pub struct RpcCliArgs {
    /// JSON-RPC endpoint of the gno.land node.
    #[arg(env = "INDEXER_RPC_URL", long)]
    pub rpc_url: Url,

    /// Per request timeout in seconds.
    #[arg(env = "INDEXER_RPC_TIMEOUT_SECS", long, default_value = "10")]
    pub rpc_timeout_secs: u64,

    /// Attempts per block or transaction fetch. 1 disables retrying.
    #[arg(env = "INDEXER_RPC_FETCH_ATTEMPTS", long, default_value = "3")]
    pub rpc_fetch_attempts: u32,

    /// Requests allowed per window.
    #[arg(
        env = "INDEXER_RPC_RATE_LIMIT",
        long,
        default_value = "200",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub rpc_rate_limit: u32,

    /// Length of the rate limit window in milliseconds.
    #[arg(
        env = "INDEXER_RPC_RATE_WINDOW_MS",
        long,
        default_value = "1000",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub rpc_rate_window_ms: u64,
}
