//! Storage rows. Addresses are replaced by their surrogate ids, coin lists are stored as JSON.

use chrono::{DateTime, Utc};
use indexer_tx_decoder::Coin;

#[derive(Debug, Clone, PartialEq)]
pub struct BlockRow {
    pub hash: Vec<u8>,
    pub height: i64,
    pub timestamp: DateTime<Utc>,
    pub chain_name: String,
    pub proposer: i32,
    pub txs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorBlockSigningRow {
    pub block_height: i64,
    pub timestamp: DateTime<Utc>,
    pub chain_name: String,
    pub proposer: i32,
    pub signed_vals: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionGeneralRow {
    pub tx_hash: String,
    pub chain_name: String,
    pub block_height: i64,
    pub timestamp: DateTime<Utc>,
    pub msg_type: Option<String>,
    pub signers: Vec<i32>,
    pub memo: String,
    pub fee_amount: i64,
    pub fee_denom: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub success: bool,
    pub events: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgSendRow {
    pub tx_hash: String,
    pub chain_name: String,
    pub message_counter: i16,
    pub timestamp: DateTime<Utc>,
    pub signers: Vec<i32>,
    pub from_address: i32,
    pub to_address: i32,
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgCallRow {
    pub tx_hash: String,
    pub chain_name: String,
    pub message_counter: i16,
    pub timestamp: DateTime<Utc>,
    pub signers: Vec<i32>,
    pub caller: i32,
    pub pkg_path: String,
    pub func_name: String,
    pub args: Vec<String>,
    pub send: Vec<Coin>,
    pub max_deposit: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgAddPackageRow {
    pub tx_hash: String,
    pub chain_name: String,
    pub message_counter: i16,
    pub timestamp: DateTime<Utc>,
    pub signers: Vec<i32>,
    pub creator: i32,
    pub pkg_path: String,
    pub pkg_name: String,
    pub pkg_file_names: Vec<String>,
    pub send: Vec<Coin>,
    pub max_deposit: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgRunRow {
    pub tx_hash: String,
    pub chain_name: String,
    pub message_counter: i16,
    pub timestamp: DateTime<Utc>,
    pub signers: Vec<i32>,
    pub caller: i32,
    pub pkg_path: String,
    pub pkg_name: String,
    pub pkg_file_names: Vec<String>,
    pub send: Vec<Coin>,
    pub max_deposit: Vec<Coin>,
}

/// Message rows of one batch, split per table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageRows {
    pub send: Vec<MsgSendRow>,
    pub call: Vec<MsgCallRow>,
    pub add_package: Vec<MsgAddPackageRow>,
    pub run: Vec<MsgRunRow>,
}

impl MessageRows {
    pub fn len(&self) -> usize {
        self.send.len() + self.call.len() + self.add_package.len() + self.run.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
