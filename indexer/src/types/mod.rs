pub mod rows;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which surrogate-id space an address belongs to. The two spaces never share ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressRole {
    Account,
    Validator,
}

impl AddressRole {
    pub fn table(&self) -> &'static str {
        match self {
            AddressRole::Account => "addresses",
            AddressRole::Validator => "validator_addresses",
        }
    }
}

impl std::fmt::Display for AddressRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressRole::Account => write!(f, "account"),
            AddressRole::Validator => write!(f, "validator"),
        }
    }
}

/// A block as returned by the RPC port. Immutable once fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub height: u64,
    /// Base64 block hash.
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub chain_id: String,
    pub proposer_address: String,
    /// Base64 SHA-256 of each envelope in `data.txs`, in block order.
    pub tx_hashes: Vec<String>,
    /// Validators whose precommit for the previous block is recorded in this block.
    pub signers: Vec<String>,
}

impl Block {
    /// Proposer followed by precommit signers.
    pub fn validator_addresses(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.proposer_address.as_str()).chain(self.signers.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
}

/// A typed event emitted while executing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "@type", default)]
    pub at_type: String,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub pkg_path: String,
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub attrs: Vec<EventAttribute>,
}

/// A transaction as returned by the RPC port.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub hash: String,
    pub height: u64,
    pub index: u32,
    /// Base64 amino envelope.
    pub raw: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    /// Execution error reported by the node, `None` on success.
    pub error: Option<String>,
    pub events: Vec<Event>,
}

impl Transaction {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// A transaction paired with the timestamp of the block that contains it.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedTransaction {
    pub tx: Transaction,
    pub timestamp: DateTime<Utc>,
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
