use clap::{Parser, Subcommand};

pub mod database;
pub mod pipeline;
pub mod rpc;

pub use database::DatabaseCliArgs;
pub use pipeline::{PipelineCliArgs, RetryCliArgs};
pub use rpc::RpcCliArgs;

#[derive(Parser, Debug)]
#[command(
    name = "indexer",
    about = "Gno chain indexer - copies blocks, transactions and messages into Postgres",
    long_about = "Fetches blocks and transactions from a gno.land node, decodes them and writes them into a \
    relational store.\n\n\
    Quick Start:\n  \
    indexer setup\n  \
    indexer historic --from-height 1 --to-height 10000\n  \
    indexer live",
    after_help = "Every flag can also be set through its INDEXER_* environment variable or a .env file."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a fixed height range, then exit
    Historic {
        #[command(flatten)]
        historic_command: Box<HistoricCmd>,
    },
    /// Follow the chain head until interrupted
    Live {
        #[command(flatten)]
        live_command: Box<LiveCmd>,
    },
    /// Create the storage schema
    Setup {
        #[command(flatten)]
        setup_command: Box<SetupCmd>,
    },
}

/// Everything a historic or live run needs.
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[clap(flatten)]
    pub database_args: DatabaseCliArgs,

    #[clap(flatten)]
    pub rpc_args: RpcCliArgs,

    #[clap(flatten)]
    pub pipeline_args: PipelineCliArgs,

    #[clap(flatten)]
    pub retry_args: RetryCliArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct HistoricCmd {
    /// First height to index, inclusive
    #[arg(env = "INDEXER_FROM_HEIGHT", long)]
    pub from_height: u64,

    /// Last height to index, inclusive
    #[arg(env = "INDEXER_TO_HEIGHT", long)]
    pub to_height: u64,

    #[clap(flatten)]
    pub run_args: RunArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct LiveCmd {
    /// Start from the current chain head instead of the highest stored height
    #[arg(env = "INDEXER_SKIP_DB_CHECK", long, default_value_t = false)]
    pub skip_db_check: bool,

    #[clap(flatten)]
    pub run_args: RunArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct SetupCmd {
    #[clap(flatten)]
    pub database_args: DatabaseCliArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_historic_command() {
        let cli = Cli::try_parse_from([
            "indexer",
            "historic",
            "--from-height",
            "1",
            "--to-height",
            "10",
            "--database-url",
            "postgres://localhost/indexer",
            "--rpc-url",
            "http://localhost:26657",
        ])
        .unwrap();

        assert_matches!(cli.command, Commands::Historic { historic_command } => {
            assert_eq!(historic_command.from_height, 1);
            assert_eq!(historic_command.to_height, 10);
            assert_eq!(historic_command.run_args.pipeline_args.chain_name, "gnoland");
            assert_eq!(historic_command.run_args.pipeline_args.max_block_chunk_size, 50);
        });
    }

    #[test]
    fn test_parse_live_command() {
        let cli = Cli::try_parse_from([
            "indexer",
            "live",
            "--skip-db-check",
            "--database-url",
            "postgres://localhost/indexer",
            "--rpc-url",
            "http://localhost:26657",
            "--live-pooling-ms",
            "500",
        ])
        .unwrap();

        assert_matches!(cli.command, Commands::Live { live_command } => {
            assert!(live_command.skip_db_check);
            assert_eq!(live_command.run_args.pipeline_args.live_pooling_ms, 500);
        });
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let result = Cli::try_parse_from([
            "indexer",
            "historic",
            "--from-height",
            "1",
            "--to-height",
            "10",
            "--database-url",
            "postgres://localhost/indexer",
            "--rpc-url",
            "http://localhost:26657",
            "--max-block-chunk-size",
            "0",
        ]);
        assert!(result.is_err());
    }
}
