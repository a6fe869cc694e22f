pub mod error;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::types::rows::{
    BlockRow, MsgAddPackageRow, MsgCallRow, MsgRunRow, MsgSendRow, TransactionGeneralRow, ValidatorBlockSigningRow,
};
use crate::types::AddressRole;
pub use error::DatabaseError;
pub use postgres::PostgresClient;

/// Trait defining database operations
///
/// All writers are batch oriented. Re-inserting rows that already exist is a no-op, so a height
/// range can be indexed again without failing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// get_last_block_height - Highest indexed height of `chain_name`, `None` on an empty store
    async fn get_last_block_height(&self, chain_name: &str) -> Result<Option<u64>, DatabaseError>;

    /// find_existing_addresses - Surrogate ids of the given addresses that are already stored
    async fn find_existing_addresses(
        &self,
        addresses: &[String],
        chain_name: &str,
        role: AddressRole,
    ) -> Result<HashMap<String, i32>, DatabaseError>;

    /// get_all_addresses - Addresses with an id above `since_id`, and the highest id seen
    async fn get_all_addresses(
        &self,
        chain_name: &str,
        role: AddressRole,
        since_id: i32,
    ) -> Result<(HashMap<String, i32>, i32), DatabaseError>;

    /// insert_addresses - Assign ids to new addresses, existing ones are left untouched
    async fn insert_addresses(&self, addresses: &[String], chain_name: &str, role: AddressRole)
        -> Result<(), DatabaseError>;

    async fn insert_blocks(&self, rows: &[BlockRow]) -> Result<u64, DatabaseError>;

    async fn insert_validator_block_signings(&self, rows: &[ValidatorBlockSigningRow]) -> Result<u64, DatabaseError>;

    async fn insert_transactions_general(&self, rows: &[TransactionGeneralRow]) -> Result<u64, DatabaseError>;

    async fn insert_msg_send(&self, rows: &[MsgSendRow]) -> Result<u64, DatabaseError>;

    async fn insert_msg_call(&self, rows: &[MsgCallRow]) -> Result<u64, DatabaseError>;

    async fn insert_msg_add_package(&self, rows: &[MsgAddPackageRow]) -> Result<u64, DatabaseError>;

    async fn insert_msg_run(&self, rows: &[MsgRunRow]) -> Result<u64, DatabaseError>;
}
