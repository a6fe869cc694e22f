//! Test doubles and chain fixtures shared by the pipeline tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use indexer_resilience::{RateLimiter, RetryParams};
use indexer_tx_decoder::{encode_address, proto, tx_hash_from_base64, MsgType};
use prost::Message as _;
use rstest::fixture;

use crate::cache::AddressCache;
use crate::core::client::database::{DatabaseClient, DatabaseError};
use crate::core::client::rpc::{RateLimitedRpc, RpcClient, RpcError, RpcTarget};
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::processor::{DataProcessor, SolverSettings};
use crate::query::QueryOperator;
use crate::types::rows::{
    BlockRow, MsgAddPackageRow, MsgCallRow, MsgRunRow, MsgSendRow, TransactionGeneralRow, ValidatorBlockSigningRow,
};
use crate::types::{AddressRole, Block, Transaction};

pub const CHAIN_NAME: &str = "test-chain";

/// Retry without sleeping.
pub const FAST_RETRY: RetryParams =
    RetryParams { retry_amount: 3, pause_every: 0, pause_time: Duration::ZERO, backoff_base: Duration::ZERO };

// ------------------------------------------------------------------------------------------------
// Chain data
// ------------------------------------------------------------------------------------------------

/// Bech32 account address built from a repeated byte.
pub fn account(seed: u8) -> String {
    encode_address("test", &[seed; 20]).unwrap()
}

pub fn validator(seed: u8) -> String {
    format!("g1validator{seed:02}")
}

pub fn timestamp(height: u64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + height as i64, 0).unwrap()
}

fn coin(amount: i64, denom: &str) -> proto::Coin {
    proto::Coin { denom: denom.to_string(), amount }
}

fn envelope(msgs: Vec<proto::Any>, memo: &str) -> String {
    let tx = proto::Tx {
        msgs,
        fee: Some(proto::Fee { gas_wanted: 2_000_000, gas_fee: Some(coin(1_000, "ugnot")) }),
        signatures: vec![],
        memo: memo.to_string(),
    };
    BASE64.encode(tx.encode_to_vec())
}

fn any(msg_type: MsgType, value: Vec<u8>) -> proto::Any {
    proto::Any { type_url: msg_type.type_url().to_string(), value }
}

pub fn send_msg(from: u8, to: u8, amount: i64) -> proto::Any {
    let msg =
        proto::MsgSend { from_address: vec![from; 20], to_address: vec![to; 20], amount: vec![coin(amount, "ugnot")] };
    any(MsgType::BankMsgSend, msg.encode_to_vec())
}

pub fn call_msg(caller: u8, pkg_path: &str, func: &str) -> proto::Any {
    let msg = proto::MsgCall {
        caller: vec![caller; 20],
        send: vec![],
        max_deposit: vec![],
        pkg_path: pkg_path.to_string(),
        func: func.to_string(),
        args: vec!["1".to_string()],
    };
    any(MsgType::VmMsgCall, msg.encode_to_vec())
}

pub fn run_msg(caller: u8) -> proto::Any {
    let msg = proto::MsgRun {
        caller: vec![caller; 20],
        send: vec![],
        max_deposit: vec![],
        package: Some(proto::MemPackage {
            name: "main".to_string(),
            path: "gno.land/e/g1run/run".to_string(),
            files: vec![proto::MemFile { name: "script.gno".to_string(), body: "package main".to_string() }],
        }),
    };
    any(MsgType::VmMsgRun, msg.encode_to_vec())
}

/// Base64 envelope carrying one bank send.
pub fn send_envelope(from: u8, to: u8, amount: i64) -> String {
    envelope(vec![send_msg(from, to, amount)], "")
}

pub fn envelope_of(msgs: Vec<proto::Any>, memo: &str) -> String {
    envelope(msgs, memo)
}

/// A block at `height` proposed by `validator(proposer)` and signed by `validator(s)` for each signer.
pub fn block(height: u64, proposer: u8, signers: &[u8], envelopes: &[String]) -> Block {
    Block {
        height,
        hash: BASE64.encode([height as u8; 32]),
        timestamp: timestamp(height),
        chain_id: "dev".to_string(),
        proposer_address: validator(proposer),
        tx_hashes: envelopes.iter().map(|e| tx_hash_from_base64(e).unwrap()).collect(),
        signers: signers.iter().map(|s| validator(*s)).collect(),
    }
}

pub fn transaction(envelope: &str, height: u64, index: u32) -> Transaction {
    Transaction {
        hash: tx_hash_from_base64(envelope).unwrap(),
        height,
        index,
        raw: envelope.to_string(),
        gas_wanted: 2_000_000,
        gas_used: 1_500_000,
        error: None,
        events: vec![],
    }
}

/// `count` consecutive blocks from height 1, each with one send from account `height` to account 0xAA.
pub fn simple_chain(count: u64) -> (Vec<Block>, Vec<Transaction>) {
    let mut blocks = Vec::new();
    let mut txs = Vec::new();
    for height in 1..=count {
        let envelope = send_envelope(height as u8, 0xAA, height as i64 * 10);
        blocks.push(block(height, (height % 3) as u8, &[0, 1, 2], std::slice::from_ref(&envelope)));
        txs.push(transaction(&envelope, height, 0));
    }
    (blocks, txs)
}

// ------------------------------------------------------------------------------------------------
// Storage double
// ------------------------------------------------------------------------------------------------

#[derive(Default)]
pub struct StoreState {
    pub addresses: HashMap<AddressRole, BTreeMap<String, i32>>,
    pub blocks: BTreeMap<i64, BlockRow>,
    pub signings: Vec<ValidatorBlockSigningRow>,
    pub transactions: BTreeMap<String, TransactionGeneralRow>,
    pub sends: Vec<MsgSendRow>,
    pub calls: Vec<MsgCallRow>,
    pub add_packages: Vec<MsgAddPackageRow>,
    pub runs: Vec<MsgRunRow>,
    /// Storage operations in the order they completed
    pub log: Vec<String>,
    /// Bulk address inserts to fail before succeeding
    pub failing_address_inserts: u32,
    pub fail_message_inserts: bool,
}

/// [`DatabaseClient`] over plain maps, assigning ids the way a serial column does.
#[derive(Default)]
pub struct InMemoryDatabase {
    pub state: Mutex<StoreState>,
}

impl InMemoryDatabase {
    pub fn with_state(f: impl FnOnce(&mut StoreState)) -> Self {
        let db = Self::default();
        f(&mut db.state.lock().unwrap());
        db
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    pub fn id_of(&self, role: AddressRole, address: &str) -> Option<i32> {
        self.state().addresses.get(&role).and_then(|m| m.get(address).copied())
    }

    pub fn count_in_log(&self, entry: &str) -> usize {
        self.state().log.iter().filter(|e| *e == entry).count()
    }
}

fn insert_log(role: AddressRole) -> String {
    format!("insert_addresses:{role}")
}

#[async_trait]
impl DatabaseClient for InMemoryDatabase {
    async fn get_last_block_height(&self, _chain_name: &str) -> Result<Option<u64>, DatabaseError> {
        Ok(self.state().blocks.keys().next_back().map(|h| *h as u64))
    }

    async fn find_existing_addresses(
        &self,
        addresses: &[String],
        _chain_name: &str,
        role: AddressRole,
    ) -> Result<HashMap<String, i32>, DatabaseError> {
        let state = self.state();
        let Some(stored) = state.addresses.get(&role) else { return Ok(HashMap::new()) };
        Ok(addresses.iter().filter_map(|a| stored.get(a).map(|id| (a.clone(), *id))).collect())
    }

    async fn get_all_addresses(
        &self,
        _chain_name: &str,
        role: AddressRole,
        since_id: i32,
    ) -> Result<(HashMap<String, i32>, i32), DatabaseError> {
        let state = self.state();
        let stored = state.addresses.get(&role).cloned().unwrap_or_default();
        let found: HashMap<String, i32> = stored.into_iter().filter(|(_, id)| *id > since_id).collect();
        let max_id = found.values().copied().max().unwrap_or(since_id);
        Ok((found, max_id))
    }

    async fn insert_addresses(
        &self,
        addresses: &[String],
        _chain_name: &str,
        role: AddressRole,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state();
        if addresses.len() > 1 && state.failing_address_inserts > 0 {
            state.failing_address_inserts -= 1;
            return Err(DatabaseError::Other("connection reset".to_string()));
        }
        let stored = state.addresses.entry(role).or_default();
        for address in addresses {
            let next = stored.len() as i32 + 1;
            stored.entry(address.clone()).or_insert(next);
        }
        state.log.push(insert_log(role));
        Ok(())
    }

    async fn insert_blocks(&self, rows: &[BlockRow]) -> Result<u64, DatabaseError> {
        let mut state = self.state();
        let mut written = 0;
        for row in rows {
            if !state.blocks.contains_key(&row.height) {
                state.blocks.insert(row.height, row.clone());
                written += 1;
            }
        }
        state.log.push("insert_blocks".to_string());
        Ok(written)
    }

    async fn insert_validator_block_signings(&self, rows: &[ValidatorBlockSigningRow]) -> Result<u64, DatabaseError> {
        let mut state = self.state();
        state.signings.extend_from_slice(rows);
        state.log.push("insert_validator_block_signings".to_string());
        Ok(rows.len() as u64)
    }

    async fn insert_transactions_general(&self, rows: &[TransactionGeneralRow]) -> Result<u64, DatabaseError> {
        let mut state = self.state();
        let mut written = 0;
        for row in rows {
            if !state.transactions.contains_key(&row.tx_hash) {
                state.transactions.insert(row.tx_hash.clone(), row.clone());
                written += 1;
            }
        }
        state.log.push("insert_transactions_general".to_string());
        Ok(written)
    }

    async fn insert_msg_send(&self, rows: &[MsgSendRow]) -> Result<u64, DatabaseError> {
        let mut state = self.state();
        if state.fail_message_inserts {
            return Err(DatabaseError::Other("bank_msg_send is unavailable".to_string()));
        }
        state.sends.extend_from_slice(rows);
        state.log.push("insert_msg_send".to_string());
        Ok(rows.len() as u64)
    }

    async fn insert_msg_call(&self, rows: &[MsgCallRow]) -> Result<u64, DatabaseError> {
        let mut state = self.state();
        state.calls.extend_from_slice(rows);
        state.log.push("insert_msg_call".to_string());
        Ok(rows.len() as u64)
    }

    async fn insert_msg_add_package(&self, rows: &[MsgAddPackageRow]) -> Result<u64, DatabaseError> {
        let mut state = self.state();
        state.add_packages.extend_from_slice(rows);
        state.log.push("insert_msg_add_package".to_string());
        Ok(rows.len() as u64)
    }

    async fn insert_msg_run(&self, rows: &[MsgRunRow]) -> Result<u64, DatabaseError> {
        let mut state = self.state();
        state.runs.extend_from_slice(rows);
        state.log.push("insert_msg_run".to_string());
        Ok(rows.len() as u64)
    }
}

// ------------------------------------------------------------------------------------------------
// RPC double
// ------------------------------------------------------------------------------------------------

/// [`RpcClient`] answering from a fixed set of blocks and transactions.
#[derive(Default)]
pub struct ScriptedRpc {
    pub blocks: HashMap<u64, Block>,
    pub txs: HashMap<String, Transaction>,
    pub latest: AtomicU64,
    /// Heights that fail this many more times before answering
    pub flaky_heights: Mutex<HashMap<u64, u32>>,
    /// Heights that never answer
    pub dead_heights: HashSet<u64>,
    pub block_calls: AtomicUsize,
    pub tx_calls: AtomicUsize,
}

impl ScriptedRpc {
    pub fn new(blocks: Vec<Block>, txs: Vec<Transaction>) -> Self {
        let latest = blocks.iter().map(|b| b.height).max().unwrap_or(0);
        Self {
            blocks: blocks.into_iter().map(|b| (b.height, b)).collect(),
            txs: txs.into_iter().map(|t| (t.hash.clone(), t)).collect(),
            latest: AtomicU64::new(latest),
            ..Default::default()
        }
    }

    pub fn with_flaky_height(self, height: u64, failures: u32) -> Self {
        self.flaky_heights.lock().unwrap().insert(height, failures);
        self
    }

    pub fn with_dead_height(mut self, height: u64) -> Self {
        self.dead_heights.insert(height);
        self
    }

    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    pub fn tx_calls(&self) -> usize {
        self.tx_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcClient for ScriptedRpc {
    async fn get_block(&self, height: u64) -> Result<Block, RpcError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        let target = RpcTarget::Height(height);
        if self.dead_heights.contains(&height) {
            return Err(RpcError::Transport { target, message: "connection refused".to_string() });
        }
        if let Some(remaining) = self.flaky_heights.lock().unwrap().get_mut(&height) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RpcError::Transport { target, message: "timed out".to_string() });
            }
        }
        if height > self.latest.load(Ordering::SeqCst) {
            return Err(RpcError::Node { target, code: -32603, message: "height not available".to_string() });
        }
        self.blocks.get(&height).cloned().ok_or(RpcError::Node {
            target,
            code: -32603,
            message: "block not found".to_string(),
        })
    }

    async fn get_tx(&self, hash: &str) -> Result<Transaction, RpcError> {
        self.tx_calls.fetch_add(1, Ordering::SeqCst);
        self.txs.get(hash).cloned().ok_or_else(|| RpcError::Node {
            target: RpcTarget::Hash(hash.to_string()),
            code: -32603,
            message: "tx not found".to_string(),
        })
    }

    async fn get_latest_block_height(&self) -> Result<u64, RpcError> {
        Ok(self.latest.load(Ordering::SeqCst))
    }

    async fn health(&self) -> Result<(), RpcError> {
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Wiring
// ------------------------------------------------------------------------------------------------

pub fn rate_limited(rpc: Arc<dyn RpcClient>) -> RateLimitedRpc {
    RateLimitedRpc::new(rpc, Arc::new(RateLimiter::new(10_000, Duration::from_secs(1))))
}

pub fn caches(db: Arc<dyn DatabaseClient>) -> (Arc<AddressCache>, Arc<AddressCache>) {
    (
        Arc::new(AddressCache::new(db.clone(), CHAIN_NAME, AddressRole::Account)),
        Arc::new(AddressCache::new(db, CHAIN_NAME, AddressRole::Validator)),
    )
}

pub fn processor(db: Arc<dyn DatabaseClient>) -> DataProcessor {
    let (accounts, validators) = caches(db.clone());
    DataProcessor::new(
        db,
        accounts,
        validators,
        CHAIN_NAME,
        SolverSettings { retry: FAST_RETRY, allow_one_by_one_fallback: true },
    )
}

pub fn orchestrator(rpc: Arc<ScriptedRpc>, db: Arc<InMemoryDatabase>, chunk_size: u64) -> Orchestrator {
    let query = QueryOperator::new(rate_limited(rpc), FAST_RETRY);
    let processor = Arc::new(processor(db.clone()));
    Orchestrator::new(
        query,
        processor,
        db,
        OrchestratorConfig {
            chain_name: CHAIN_NAME.to_string(),
            max_block_chunk_size: chunk_size,
            max_transaction_chunk_size: 4,
            live_pooling: Duration::from_millis(10),
        },
    )
}

#[fixture]
pub fn db() -> Arc<InMemoryDatabase> {
    Arc::new(InMemoryDatabase::default())
}
