use std::sync::Arc;

use clap::Parser as _;
use dotenvy::dotenv;
use indexer::cache::AddressCache;
use indexer::cli::{Cli, Commands, HistoricCmd, LiveCmd, RunArgs};
use indexer::config::IndexerConfig;
use indexer::core::client::{DatabaseClient, HttpRpcClient, PostgresClient, RateLimitedRpc};
use indexer::orchestrator::Orchestrator;
use indexer::processor::DataProcessor;
use indexer::query::QueryOperator;
use indexer::setup::setup;
use indexer::types::AddressRole;
use indexer::utils::logging::init_logging;
use indexer::utils::signal_handler::SignalHandler;
use indexer::IndexerResult;
use indexer_resilience::RateLimiter;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Historic { historic_command } => {
            info!("Executing historic command with args: {:?}", historic_command);
            run_historic(historic_command).await
        }
        Commands::Live { live_command } => {
            info!("Executing live command with args: {:?}", live_command);
            run_live(live_command).await
        }
        Commands::Setup { setup_command } => setup(setup_command).await,
    };

    if let Err(e) = result {
        error!(error = %e, error_chain = ?e, "Indexer stopped with an error");
        std::process::exit(1);
    }
}

/// The wired pipeline plus the resources to release once it is done.
struct Pipeline {
    orchestrator: Orchestrator,
    postgres: Arc<PostgresClient>,
    limiter: Arc<RateLimiter>,
}

impl Pipeline {
    async fn shutdown(self) {
        self.limiter.close();
        self.postgres.disconnect().await;
        info!("Indexer shut down");
    }
}

async fn build_pipeline(run_args: &RunArgs) -> IndexerResult<Pipeline> {
    let config = IndexerConfig::try_from(run_args)?;

    let postgres = Arc::new(PostgresClient::connect(&config.database_url, config.database_max_connections).await?);
    let db: Arc<dyn DatabaseClient> = postgres.clone();

    let limiter = Arc::new(RateLimiter::new(config.rpc.rate_limit as usize, config.rpc.rate_window));
    let http = HttpRpcClient::new(config.rpc.url.clone(), config.rpc.timeout)?;
    let rpc = RateLimitedRpc::new(Arc::new(http), limiter.clone());
    rpc.health().await?;
    info!(url = %config.rpc.url, "RPC node is healthy");

    let chain_name = config.orchestrator.chain_name.clone();
    let accounts = Arc::new(AddressCache::new(db.clone(), chain_name.clone(), AddressRole::Account));
    let validators = Arc::new(AddressCache::new(db.clone(), chain_name.clone(), AddressRole::Validator));
    tokio::try_join!(accounts.load_addresses(), validators.load_addresses())?;

    let processor = Arc::new(DataProcessor::new(db.clone(), accounts, validators, chain_name, config.solver));
    let query = QueryOperator::new(rpc, config.rpc.retry);
    debug!("Pipeline initialized");

    Ok(Pipeline { orchestrator: Orchestrator::new(query, processor, db, config.orchestrator), postgres, limiter })
}

async fn run_historic(historic_cmd: &HistoricCmd) -> IndexerResult<()> {
    let pipeline = build_pipeline(&historic_cmd.run_args).await?;
    let result = pipeline.orchestrator.historic_process(historic_cmd.from_height, historic_cmd.to_height).await;
    pipeline.shutdown().await;

    let summary = result?;
    for chunk in summary.failed_chunks() {
        warn!(from = chunk.from, to = chunk.to, outcome = ?chunk.outcome, "Range needs to be indexed again");
    }
    Ok(())
}

async fn run_live(live_cmd: &LiveCmd) -> IndexerResult<()> {
    let pipeline = build_pipeline(&live_cmd.run_args).await?;
    let cancel = SignalHandler::new().spawn();
    let result = pipeline.orchestrator.live_process(cancel, live_cmd.skip_db_check).await;
    pipeline.shutdown().await;
    result
}
