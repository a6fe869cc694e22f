use clap::Args;

/// Parameters used to config Postgres.
#[derive(Debug, Clone, Args)]
pub struct DatabaseCliArgs {
    /// The connection string of the Postgres database.
    #[arg(env = "INDEXER_DATABASE_URL", long)]
    pub database_url: String,

    /// Upper bound of the connection pool.
    #[arg(env = "INDEXER_DATABASE_MAX_CONNECTIONS", long, default_value = "20")]
    pub database_max_connections: u32,
}
