use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::query_builder::Separated;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};

use super::{DatabaseClient, DatabaseError};
use crate::types::rows::{
    BlockRow, MsgAddPackageRow, MsgCallRow, MsgRunRow, MsgSendRow, TransactionGeneralRow, ValidatorBlockSigningRow,
};
use crate::types::AddressRole;

/// Schema applied by `indexer setup`.
pub const MIGRATION: &str = include_str!("../../../../migrations/0001_init.sql");

/// Postgres caps a statement at 65535 bind parameters.
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

/// PostgreSQL (optionally TimescaleDB) implementation of [`DatabaseClient`].
#[derive(Debug, Clone)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        debug!(max_connections, "Connected to database");
        Ok(Self { pool })
    }

    /// Create tables, indexes and, when TimescaleDB is available, hypertables.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::raw_sql(MIGRATION).execute(&self.pool).await.map_err(|e| DatabaseError::Migration(e.to_string()))?;
        info!("Database schema is up to date");
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.pool.close().await;
    }

    /// Multi-row `INSERT ... VALUES` in as many statements as the bind limit requires.
    async fn bulk_insert<'r, T: Sync>(
        &self,
        operation: &'static str,
        statement: &str,
        columns: usize,
        rows: &'r [T],
        mut bind: impl FnMut(Separated<'_, 'r, Postgres, &'static str>, &'r T) + Send,
    ) -> Result<u64, DatabaseError> {
        let mut affected = 0;
        for chunk in rows.chunks((MAX_BIND_PARAMS / columns).max(1)) {
            let mut builder: QueryBuilder<'r, Postgres> = QueryBuilder::new(statement);
            builder.push_values(chunk, &mut bind);
            builder.push(" ON CONFLICT DO NOTHING");
            let result = builder.build().execute(&self.pool).await.map_err(DatabaseError::query(operation))?;
            affected += result.rows_affected();
        }
        debug!(operation, rows = rows.len(), inserted = affected, "Bulk insert done");
        Ok(affected)
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn get_last_block_height(&self, chain_name: &str) -> Result<Option<u64>, DatabaseError> {
        let height: Option<i64> = sqlx::query_scalar("SELECT MAX(height) FROM blocks WHERE chain_name = $1")
            .bind(chain_name)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::query("get_last_block_height"))?;

        height
            .map(|h| {
                u64::try_from(h)
                    .map_err(|e| DatabaseError::InvalidData { column: "blocks.height", message: e.to_string() })
            })
            .transpose()
    }

    async fn find_existing_addresses(
        &self,
        addresses: &[String],
        chain_name: &str,
        role: AddressRole,
    ) -> Result<HashMap<String, i32>, DatabaseError> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!("SELECT address, id FROM {} WHERE chain_name = $1 AND address = ANY($2)", role.table());
        let rows: Vec<(String, i32)> = sqlx::query_as(&sql)
            .bind(chain_name)
            .bind(addresses)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::query("find_existing_addresses"))?;
        Ok(rows.into_iter().collect())
    }

    async fn get_all_addresses(
        &self,
        chain_name: &str,
        role: AddressRole,
        since_id: i32,
    ) -> Result<(HashMap<String, i32>, i32), DatabaseError> {
        let sql = format!("SELECT address, id FROM {} WHERE chain_name = $1 AND id > $2 ORDER BY id", role.table());
        let rows: Vec<(String, i32)> = sqlx::query_as(&sql)
            .bind(chain_name)
            .bind(since_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::query("get_all_addresses"))?;

        let max_id = rows.iter().map(|(_, id)| *id).max().unwrap_or(since_id);
        Ok((rows.into_iter().collect(), max_id))
    }

    async fn insert_addresses(
        &self,
        addresses: &[String],
        chain_name: &str,
        role: AddressRole,
    ) -> Result<(), DatabaseError> {
        let statement = format!("INSERT INTO {} (address, chain_name) ", role.table());
        self.bulk_insert("insert_addresses", &statement, 2, addresses, |mut b, address| {
            b.push_bind(address.as_str()).push_bind(chain_name);
        })
        .await?;
        Ok(())
    }

    async fn insert_blocks(&self, rows: &[BlockRow]) -> Result<u64, DatabaseError> {
        self.bulk_insert(
            "insert_blocks",
            "INSERT INTO blocks (hash, height, timestamp, chain_name, proposer_address, txs) ",
            6,
            rows,
            |mut b, row| {
                b.push_bind(row.hash.as_slice())
                    .push_bind(row.height)
                    .push_bind(row.timestamp)
                    .push_bind(row.chain_name.as_str())
                    .push_bind(row.proposer)
                    .push_bind(row.txs.as_slice());
            },
        )
        .await
    }

    async fn insert_validator_block_signings(&self, rows: &[ValidatorBlockSigningRow]) -> Result<u64, DatabaseError> {
        self.bulk_insert(
            "insert_validator_block_signings",
            "INSERT INTO validator_block_signing (block_height, timestamp, chain_name, proposer, signed_vals) ",
            5,
            rows,
            |mut b, row| {
                b.push_bind(row.block_height)
                    .push_bind(row.timestamp)
                    .push_bind(row.chain_name.as_str())
                    .push_bind(row.proposer)
                    .push_bind(row.signed_vals.as_slice());
            },
        )
        .await
    }

    async fn insert_transactions_general(&self, rows: &[TransactionGeneralRow]) -> Result<u64, DatabaseError> {
        self.bulk_insert(
            "insert_transactions_general",
            "INSERT INTO transaction_general (tx_hash, chain_name, block_height, timestamp, msg_type, signers, memo, \
             fee_amount, fee_denom, gas_wanted, gas_used, success, events) ",
            13,
            rows,
            |mut b, row| {
                b.push_bind(row.tx_hash.as_str())
                    .push_bind(row.chain_name.as_str())
                    .push_bind(row.block_height)
                    .push_bind(row.timestamp)
                    .push_bind(row.msg_type.as_deref())
                    .push_bind(row.signers.as_slice())
                    .push_bind(row.memo.as_str())
                    .push_bind(row.fee_amount)
                    .push_bind(row.fee_denom.as_str())
                    .push_bind(row.gas_wanted)
                    .push_bind(row.gas_used)
                    .push_bind(row.success)
                    .push_bind(Json(&row.events));
            },
        )
        .await
    }

    async fn insert_msg_send(&self, rows: &[MsgSendRow]) -> Result<u64, DatabaseError> {
        self.bulk_insert(
            "insert_msg_send",
            "INSERT INTO bank_msg_send (tx_hash, chain_name, message_counter, timestamp, signers, from_address, \
             to_address, amount) ",
            8,
            rows,
            |mut b, row| {
                b.push_bind(row.tx_hash.as_str())
                    .push_bind(row.chain_name.as_str())
                    .push_bind(row.message_counter)
                    .push_bind(row.timestamp)
                    .push_bind(row.signers.as_slice())
                    .push_bind(row.from_address)
                    .push_bind(row.to_address)
                    .push_bind(Json(&row.amount));
            },
        )
        .await
    }

    async fn insert_msg_call(&self, rows: &[MsgCallRow]) -> Result<u64, DatabaseError> {
        self.bulk_insert(
            "insert_msg_call",
            "INSERT INTO vm_msg_call (tx_hash, chain_name, message_counter, timestamp, signers, caller, pkg_path, \
             func_name, args, send, max_deposit) ",
            11,
            rows,
            |mut b, row| {
                b.push_bind(row.tx_hash.as_str())
                    .push_bind(row.chain_name.as_str())
                    .push_bind(row.message_counter)
                    .push_bind(row.timestamp)
                    .push_bind(row.signers.as_slice())
                    .push_bind(row.caller)
                    .push_bind(row.pkg_path.as_str())
                    .push_bind(row.func_name.as_str())
                    .push_bind(row.args.as_slice())
                    .push_bind(Json(&row.send))
                    .push_bind(Json(&row.max_deposit));
            },
        )
        .await
    }

    async fn insert_msg_add_package(&self, rows: &[MsgAddPackageRow]) -> Result<u64, DatabaseError> {
        self.bulk_insert(
            "insert_msg_add_package",
            "INSERT INTO vm_msg_add_package (tx_hash, chain_name, message_counter, timestamp, signers, creator, \
             pkg_path, pkg_name, pkg_file_names, send, max_deposit) ",
            11,
            rows,
            |mut b, row| {
                b.push_bind(row.tx_hash.as_str())
                    .push_bind(row.chain_name.as_str())
                    .push_bind(row.message_counter)
                    .push_bind(row.timestamp)
                    .push_bind(row.signers.as_slice())
                    .push_bind(row.creator)
                    .push_bind(row.pkg_path.as_str())
                    .push_bind(row.pkg_name.as_str())
                    .push_bind(row.pkg_file_names.as_slice())
                    .push_bind(Json(&row.send))
                    .push_bind(Json(&row.max_deposit));
            },
        )
        .await
    }

    async fn insert_msg_run(&self, rows: &[MsgRunRow]) -> Result<u64, DatabaseError> {
        self.bulk_insert(
            "insert_msg_run",
            "INSERT INTO vm_msg_run (tx_hash, chain_name, message_counter, timestamp, signers, caller, pkg_path, \
             pkg_name, pkg_file_names, send, max_deposit) ",
            11,
            rows,
            |mut b, row| {
                b.push_bind(row.tx_hash.as_str())
                    .push_bind(row.chain_name.as_str())
                    .push_bind(row.message_counter)
                    .push_bind(row.timestamp)
                    .push_bind(row.signers.as_slice())
                    .push_bind(row.caller)
                    .push_bind(row.pkg_path.as_str())
                    .push_bind(row.pkg_name.as_str())
                    .push_bind(row.pkg_file_names.as_slice())
                    .push_bind(Json(&row.send))
                    .push_bind(Json(&row.max_deposit));
            },
        )
        .await
    }
}
