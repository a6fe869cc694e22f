//! JSON shapes of the tm2 JSON-RPC responses the indexer consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::{RpcError, RpcTarget};
use crate::types::{null_as_default, Block, Event, Transaction};

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorObject {
    pub fn describe(&self) -> String {
        match &self.data {
            Some(serde_json::Value::String(data)) if !data.is_empty() => format!("{}: {}", self.message, data),
            Some(serde_json::Value::Null) | None => self.message.clone(),
            Some(data) => format!("{}: {}", self.message, data),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BlockResult {
    pub block_meta: BlockMeta,
    pub block: BlockBody,
}

#[derive(Debug, Deserialize)]
pub struct BlockMeta {
    pub block_id: BlockId,
}

#[derive(Debug, Deserialize)]
pub struct BlockId {
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlockBody {
    pub header: BlockHeader,
    #[serde(default)]
    pub data: BlockData,
    #[serde(default)]
    pub last_commit: Option<Commit>,
}

#[derive(Debug, Deserialize)]
pub struct BlockHeader {
    pub chain_id: String,
    #[serde(deserialize_with = "de_u64")]
    pub height: u64,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub proposer_address: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlockData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub txs: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Commit {
    /// One slot per validator, `null` when its precommit is absent.
    #[serde(default, deserialize_with = "null_as_default")]
    pub precommits: Vec<Option<Precommit>>,
}

#[derive(Debug, Deserialize)]
pub struct Precommit {
    pub validator_address: String,
}

impl BlockResult {
    pub fn into_block(self, requested: u64) -> Result<Block, RpcError> {
        let target = RpcTarget::Height(requested);
        let header = self.block.header;
        if header.height != requested {
            return Err(RpcError::InvalidResponse {
                target,
                message: format!("node returned block #{} instead", header.height),
            });
        }

        let hash = self
            .block_meta
            .block_id
            .hash
            .filter(|hash| !hash.is_empty())
            .ok_or_else(|| RpcError::InvalidResponse { target: target.clone(), message: "missing block hash".into() })?;

        let tx_hashes = self
            .block
            .data
            .txs
            .iter()
            .map(|raw| indexer_tx_decoder::tx_hash_from_base64(raw))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RpcError::InvalidResponse { target: target.clone(), message: e.to_string() })?;

        let signers = self
            .block
            .last_commit
            .map(|commit| commit.precommits.into_iter().flatten().map(|p| p.validator_address).collect())
            .unwrap_or_default();

        Ok(Block {
            height: header.height,
            hash,
            timestamp: header.time,
            chain_id: header.chain_id,
            proposer_address: header.proposer_address,
            tx_hashes,
            signers,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TxResult {
    pub hash: String,
    #[serde(deserialize_with = "de_u64")]
    pub height: u64,
    #[serde(default, deserialize_with = "de_u64")]
    pub index: u64,
    pub tx_result: DeliverTx,
    pub tx: String,
}

#[derive(Debug, Deserialize)]
pub struct DeliverTx {
    #[serde(rename = "ResponseBase")]
    pub response_base: ResponseBase,
    #[serde(rename = "GasWanted", default, deserialize_with = "de_i64")]
    pub gas_wanted: i64,
    #[serde(rename = "GasUsed", default, deserialize_with = "de_i64")]
    pub gas_used: i64,
}

#[derive(Debug, Deserialize)]
pub struct ResponseBase {
    #[serde(rename = "Error", default)]
    pub error: Option<serde_json::Value>,
    #[serde(rename = "Events", default, deserialize_with = "null_as_default")]
    pub events: Vec<Event>,
    #[serde(rename = "Log", default, deserialize_with = "null_as_default")]
    pub log: String,
}

impl TxResult {
    pub fn into_transaction(self) -> Result<Transaction, RpcError> {
        let index = u32::try_from(self.index).map_err(|_| RpcError::InvalidResponse {
            target: RpcTarget::Hash(self.hash.clone()),
            message: format!("transaction index {} out of range", self.index),
        })?;

        let base = self.tx_result.response_base;
        let error = match base.error {
            None | Some(serde_json::Value::Null) => None,
            Some(_) if !base.log.is_empty() => Some(base.log),
            Some(value) => Some(value.to_string()),
        };

        Ok(Transaction {
            hash: self.hash,
            height: self.height,
            index,
            raw: self.tx,
            gas_wanted: self.tx_result.gas_wanted,
            gas_used: self.tx_result.gas_used,
            error,
            events: base.events,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusResult {
    pub sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
pub struct SyncInfo {
    #[serde(deserialize_with = "de_u64")]
    pub latest_block_height: u64,
}

/// tm2 encodes 64 bit integers as decimal strings, older endpoints as plain numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(i64),
}

fn de_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        StringOrNumber::Number(n) => Ok(n),
    }
}

fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        StringOrNumber::Number(n) => u64::try_from(n).map_err(serde::de::Error::custom),
    }
}
