//! Turns fetched blocks and transactions into storage rows and persists them.
//!
//! Every operation follows the same shape: transform each input item, log and drop the items
//! whose transform fails, then write the survivors in one batch. A storage error fails the
//! whole operation and is returned to the orchestrator; rows already written stay written.
//! Transforms run one task per item on the rayon pool and keep the input order.
//!
//! Envelopes are decoded once per chunk with [`decode_transactions`] and the decoded set is
//! shared by the transaction and message operations.
//!
//! Account ids are resolved inside [`DataProcessor::process_transactions`] and
//! [`DataProcessor::process_messages`] themselves. Validator ids are resolved by
//! [`DataProcessor::process_validator_addresses`] in phase 1 and only read by the phase 2
//! operations.

use std::collections::BTreeSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::Future;
use indexer_resilience::RetryParams;
use indexer_tx_decoder::{decode_base64_transaction, DecodedTransaction, MessageKind, MsgType};
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, error, warn};

use crate::cache::{AddressCache, SolveSummary};
use crate::core::client::database::{DatabaseClient, DatabaseError};
use crate::error::{IndexerError, IndexerResult};
use crate::types::rows::{
    BlockRow, MessageRows, MsgAddPackageRow, MsgCallRow, MsgRunRow, MsgSendRow, TransactionGeneralRow,
    ValidatorBlockSigningRow,
};
use crate::types::{Block, TimedTransaction};
use crate::utils::metrics::INDEXER_METRICS;

/// How the processor asks the address caches to resolve unknown addresses.
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    pub retry: RetryParams,
    pub allow_one_by_one_fallback: bool,
}

pub struct DataProcessor {
    db: Arc<dyn DatabaseClient>,
    accounts: Arc<AddressCache>,
    validators: Arc<AddressCache>,
    chain_name: String,
    solver: SolverSettings,
}

/// A fetched transaction next to its decoded envelope.
pub type Decoded<'a> = (&'a TimedTransaction, DecodedTransaction);

impl DataProcessor {
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        accounts: Arc<AddressCache>,
        validators: Arc<AddressCache>,
        chain_name: impl Into<String>,
        solver: SolverSettings,
    ) -> Self {
        Self { db, accounts, validators, chain_name: chain_name.into(), solver }
    }

    pub fn accounts(&self) -> &Arc<AddressCache> {
        &self.accounts
    }

    pub fn validators(&self) -> &Arc<AddressCache> {
        &self.validators
    }

    /// Resolve every proposer and precommit signer of `blocks` in one solver call.
    pub async fn process_validator_addresses(&self, blocks: &[Block]) -> IndexerResult<SolveSummary> {
        let addresses: Vec<String> = blocks
            .iter()
            .flat_map(Block::validator_addresses)
            .filter(|a| !a.is_empty())
            .unique()
            .map(str::to_string)
            .collect();
        if addresses.is_empty() {
            return Ok(SolveSummary::default());
        }
        Ok(self.validators.address_solver(&addresses, &self.solver.retry, self.solver.allow_one_by_one_fallback).await?)
    }

    /// Needs the validator ids resolved by [`Self::process_validator_addresses`].
    pub async fn process_blocks(&self, blocks: &[Block]) -> IndexerResult<u64> {
        let rows = transform_each("block", blocks, |b| format!("#{}", b.height), |b| self.block_row(b));
        if rows.is_empty() {
            return Ok(0);
        }
        let written = self.db.insert_blocks(&rows).await?;
        INDEXER_METRICS.blocks_written.add(written, &[]);
        debug!(rows = rows.len(), written, "Blocks persisted");
        Ok(written)
    }

    /// Needs the validator ids resolved by [`Self::process_validator_addresses`].
    pub async fn process_validator_signings(&self, blocks: &[Block]) -> IndexerResult<u64> {
        let rows = transform_each("validator signing", blocks, |b| format!("#{}", b.height), |b| self.signing_row(b));
        if rows.is_empty() {
            return Ok(0);
        }
        let written = self.db.insert_validator_block_signings(&rows).await?;
        debug!(rows = rows.len(), written, "Validator signings persisted");
        Ok(written)
    }

    pub async fn process_transactions(&self, decoded: &[Decoded<'_>]) -> IndexerResult<u64> {
        if decoded.is_empty() {
            return Ok(0);
        }

        let signers: Vec<String> = decoded.iter().flat_map(|(_, d)| d.basic.signers.iter().cloned()).collect();
        self.accounts.address_solver(&signers, &self.solver.retry, self.solver.allow_one_by_one_fallback).await?;

        let rows =
            transform_each("transaction", decoded, |(t, _)| t.tx.hash.clone(), |(t, d)| self.transaction_row(t, d));
        if rows.is_empty() {
            return Ok(0);
        }
        let written = self.db.insert_transactions_general(&rows).await?;
        INDEXER_METRICS.transactions_written.add(written, &[]);
        debug!(rows = rows.len(), written, "Transactions persisted");
        Ok(written)
    }

    pub async fn process_messages(&self, decoded: &[Decoded<'_>]) -> IndexerResult<u64> {
        if decoded.is_empty() {
            return Ok(0);
        }

        let addresses: Vec<String> = decoded
            .iter()
            .flat_map(|(_, d)| d.messages.iter().flat_map(|m| m.kind.addresses()))
            .map(str::to_string)
            .collect();
        self.accounts.address_solver(&addresses, &self.solver.retry, self.solver.allow_one_by_one_fallback).await?;

        let rows = transform_each("messages", decoded, |(t, _)| t.tx.hash.clone(), |(t, d)| self.message_rows(t, d))
            .into_iter()
            .fold(MessageRows::default(), |mut all, rows| {
                all.send.extend(rows.send);
                all.call.extend(rows.call);
                all.add_package.extend(rows.add_package);
                all.run.extend(rows.run);
                all
            });
        if rows.is_empty() {
            return Ok(0);
        }

        let (send, call, add_package, run) = tokio::try_join!(
            insert_nonempty(&rows.send, |r| self.db.insert_msg_send(r)),
            insert_nonempty(&rows.call, |r| self.db.insert_msg_call(r)),
            insert_nonempty(&rows.add_package, |r| self.db.insert_msg_add_package(r)),
            insert_nonempty(&rows.run, |r| self.db.insert_msg_run(r)),
        )?;
        let written = send + call + add_package + run;
        INDEXER_METRICS.messages_written.add(written, &[]);
        debug!(send, call, add_package, run, "Messages persisted");
        Ok(written)
    }

    fn block_row(&self, block: &Block) -> IndexerResult<BlockRow> {
        let hash = BASE64
            .decode(&block.hash)
            .map_err(|e| IndexerError::Validation(format!("block #{} has an invalid hash: {e}", block.height)))?;
        Ok(BlockRow {
            hash,
            height: to_i64(block.height)?,
            timestamp: block.timestamp,
            chain_name: self.chain_name.clone(),
            proposer: resolve(&self.validators, &block.proposer_address)?,
            txs: block.tx_hashes.clone(),
        })
    }

    fn signing_row(&self, block: &Block) -> IndexerResult<ValidatorBlockSigningRow> {
        Ok(ValidatorBlockSigningRow {
            block_height: to_i64(block.height)?,
            timestamp: block.timestamp,
            chain_name: self.chain_name.clone(),
            proposer: resolve(&self.validators, &block.proposer_address)?,
            signed_vals: block.signers.iter().map(|a| resolve(&self.validators, a)).collect::<IndexerResult<_>>()?,
        })
    }

    fn transaction_row(
        &self,
        timed: &TimedTransaction,
        decoded: &DecodedTransaction,
    ) -> IndexerResult<TransactionGeneralRow> {
        let tx = &timed.tx;
        let events = serde_json::to_value(&tx.events)
            .map_err(|e| IndexerError::Validation(format!("events of {} are not serializable: {e}", tx.hash)))?;

        Ok(TransactionGeneralRow {
            tx_hash: decoded.hash.clone(),
            chain_name: self.chain_name.clone(),
            block_height: to_i64(tx.height)?,
            timestamp: timed.timestamp,
            msg_type: transaction_msg_type(decoded).map(|t| t.as_str().to_string()),
            signers: self.resolve_accounts(&decoded.basic.signers)?,
            memo: decoded.basic.memo.clone(),
            fee_amount: decoded.basic.fee.amount,
            fee_denom: decoded.basic.fee.denom.clone(),
            gas_wanted: tx.gas_wanted,
            gas_used: tx.gas_used,
            success: tx.success(),
            events,
        })
    }

    fn message_rows(&self, timed: &TimedTransaction, decoded: &DecodedTransaction) -> IndexerResult<MessageRows> {
        let signers = self.resolve_accounts(&decoded.basic.signers)?;
        let tx_hash = &decoded.hash;
        let mut rows = MessageRows::default();

        for message in &decoded.messages {
            let message_counter = message.message_counter;
            match &message.kind {
                MessageKind::Send(msg) => rows.send.push(MsgSendRow {
                    tx_hash: tx_hash.clone(),
                    chain_name: self.chain_name.clone(),
                    message_counter,
                    timestamp: timed.timestamp,
                    signers: signers.clone(),
                    from_address: resolve(&self.accounts, &msg.from_address)?,
                    to_address: resolve(&self.accounts, &msg.to_address)?,
                    amount: msg.amount.clone(),
                }),
                MessageKind::Call(msg) => rows.call.push(MsgCallRow {
                    tx_hash: tx_hash.clone(),
                    chain_name: self.chain_name.clone(),
                    message_counter,
                    timestamp: timed.timestamp,
                    signers: signers.clone(),
                    caller: resolve(&self.accounts, &msg.caller)?,
                    pkg_path: msg.pkg_path.clone(),
                    func_name: msg.func_name.clone(),
                    args: msg.args.clone(),
                    send: msg.send.clone(),
                    max_deposit: msg.max_deposit.clone(),
                }),
                MessageKind::AddPackage(msg) => rows.add_package.push(MsgAddPackageRow {
                    tx_hash: tx_hash.clone(),
                    chain_name: self.chain_name.clone(),
                    message_counter,
                    timestamp: timed.timestamp,
                    signers: signers.clone(),
                    creator: resolve(&self.accounts, &msg.creator)?,
                    pkg_path: msg.pkg_path.clone(),
                    pkg_name: msg.pkg_name.clone(),
                    pkg_file_names: msg.file_names.clone(),
                    send: msg.send.clone(),
                    max_deposit: msg.max_deposit.clone(),
                }),
                MessageKind::Run(msg) => rows.run.push(MsgRunRow {
                    tx_hash: tx_hash.clone(),
                    chain_name: self.chain_name.clone(),
                    message_counter,
                    timestamp: timed.timestamp,
                    signers: signers.clone(),
                    caller: resolve(&self.accounts, &msg.caller)?,
                    pkg_path: msg.pkg_path.clone(),
                    pkg_name: msg.pkg_name.clone(),
                    pkg_file_names: msg.file_names.clone(),
                    send: msg.send.clone(),
                    max_deposit: msg.max_deposit.clone(),
                }),
            }
        }
        Ok(rows)
    }

    fn resolve_accounts(&self, addresses: &[String]) -> IndexerResult<Vec<i32>> {
        addresses.iter().map(|a| resolve(&self.accounts, a)).collect()
    }
}

/// The type recorded for a transaction. Transactions are expected to carry a single message
/// type; mixed ones are recorded under their first message and logged.
pub fn transaction_msg_type(decoded: &DecodedTransaction) -> Option<MsgType> {
    let types: BTreeSet<MsgType> = decoded.messages.iter().map(|m| m.kind.msg_type()).collect();
    if types.len() > 1 {
        let found = types.iter().map(MsgType::as_str).join(",");
        warn!(tx_hash = %decoded.hash, types = %found, "Transaction mixes message types, recording the first one");
    }
    decoded.messages.first().map(|m| m.kind.msg_type())
}

fn resolve(cache: &AddressCache, address: &str) -> IndexerResult<i32> {
    match cache.get_address(address) {
        0 => Err(IndexerError::UnresolvedAddress { address: address.to_string(), role: cache.role() }),
        id => Ok(id),
    }
}

fn to_i64(height: u64) -> IndexerResult<i64> {
    i64::try_from(height).map_err(|_| IndexerError::Validation(format!("height {height} does not fit in storage")))
}

/// Decode every envelope, dropping and logging the ones that fail. Keeps the input order.
pub fn decode_transactions(txs: &[TimedTransaction]) -> Vec<Decoded<'_>> {
    transform_each("transaction", txs, |t| t.tx.hash.clone(), |t| Ok((t, decode_base64_transaction(&t.tx.raw)?)))
}

/// Apply `transform` to every item on the rayon pool, dropping and logging the failures.
fn transform_each<'a, I, O>(
    entity: &'static str,
    items: &'a [I],
    label: impl Fn(&'a I) -> String + Sync,
    transform: impl Fn(&'a I) -> IndexerResult<O> + Sync,
) -> Vec<O>
where
    I: Sync,
    O: Send,
{
    items
        .par_iter()
        .filter_map(|item| match transform(item) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(entity, item = %label(item), error = %e, "Dropping item after failed transform");
                INDEXER_METRICS.dropped_items.add(1, &[opentelemetry::KeyValue::new("entity", entity)]);
                None
            }
        })
        .collect()
}

async fn insert_nonempty<'a, T, F, Fut>(rows: &'a [T], insert: F) -> Result<u64, DatabaseError>
where
    F: FnOnce(&'a [T]) -> Fut,
    Fut: Future<Output = Result<u64, DatabaseError>>,
{
    if rows.is_empty() {
        return Ok(0);
    }
    insert(rows).await
}
