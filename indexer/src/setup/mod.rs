use tracing::info;

use crate::cli::SetupCmd;
use crate::core::client::database::PostgresClient;
use crate::error::{IndexerError, IndexerResult};

/// Create every table and index the pipeline writes to. Running it twice is harmless.
pub async fn setup(setup_cmd: &SetupCmd) -> IndexerResult<()> {
    let args = &setup_cmd.database_args;
    info!("Setting up the database schema");

    let client = PostgresClient::connect(&args.database_url, args.database_max_connections)
        .await
        .map_err(|e| IndexerError::Setup(format!("could not connect to the database: {e}")))?;
    client.migrate().await.map_err(|e| IndexerError::Setup(format!("migration failed: {e}")))?;
    client.disconnect().await;

    info!("Database schema is ready");
    Ok(())
}
