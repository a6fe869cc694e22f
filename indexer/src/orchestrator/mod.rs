//! Drives the chunked pipeline in historic and live mode.
//!
//! Chunks run strictly one after another. Within a chunk, phase 1 (validator addresses,
//! transactions, messages) runs concurrently, and phase 2 (blocks, validator signings) starts
//! only once every phase 1 operation has finished, since both read validator ids phase 1
//! resolved. A persistence error in either phase aborts the chunk. Writes that already
//! landed are kept and re-indexing the range is a no-op for them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::core::client::database::DatabaseClient;
use crate::error::{IndexerError, IndexerResult};
use crate::processor::{decode_transactions, DataProcessor};
use crate::query::{successful, QueryOperator};
use crate::types::{Block, TimedTransaction};
use crate::utils::counter::ThroughputCounter;
use crate::utils::metrics::INDEXER_METRICS;

const THROUGHPUT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub chain_name: String,
    pub max_block_chunk_size: u64,
    pub max_transaction_chunk_size: usize,
    /// Idle time once live mode has caught up with the chain head
    pub live_pooling: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Processed,
    /// No block of the range could be fetched
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    pub from: u64,
    pub to: u64,
    pub blocks: usize,
    pub transactions: usize,
    pub outcome: ChunkOutcome,
}

impl ChunkReport {
    fn empty(from: u64, to: u64) -> Self {
        Self { from, to, blocks: 0, transactions: 0, outcome: ChunkOutcome::Empty }
    }

    fn failed(from: u64, to: u64, error: &IndexerError) -> Self {
        Self { from, to, blocks: 0, transactions: 0, outcome: ChunkOutcome::Failed(error.to_string()) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoricSummary {
    pub chunks: Vec<ChunkReport>,
}

impl HistoricSummary {
    pub fn blocks(&self) -> usize {
        self.chunks.iter().map(|c| c.blocks).sum()
    }

    pub fn failed_chunks(&self) -> impl Iterator<Item = &ChunkReport> {
        self.chunks.iter().filter(|c| matches!(c.outcome, ChunkOutcome::Failed(_)))
    }
}

pub struct Orchestrator {
    query: QueryOperator,
    processor: Arc<DataProcessor>,
    db: Arc<dyn DatabaseClient>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        query: QueryOperator,
        processor: Arc<DataProcessor>,
        db: Arc<dyn DatabaseClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { query, processor, db, config }
    }

    /// Index `[from, to]` once. A failed chunk is logged and skipped, the run goes on.
    pub async fn historic_process(&self, from: u64, to: u64) -> IndexerResult<HistoricSummary> {
        if from > to {
            return Err(IndexerError::Validation(format!("invalid block range: from {from} > to {to}")));
        }

        let span = info_span!("historic", mode = "historic");
        async move {
            info!(from, to, chunk_size = self.config.max_block_chunk_size, "Starting historic indexing");
            let started = Instant::now();
            let mut throughput = ThroughputCounter::new(THROUGHPUT_WINDOW);
            let mut summary = HistoricSummary::default();

            for (chunk_from, chunk_to) in chunk_ranges(from, to, self.config.max_block_chunk_size) {
                let report = match self.run_chunk(chunk_from, chunk_to).await {
                    Ok(report) => report,
                    Err(e) => ChunkReport::failed(chunk_from, chunk_to, &e),
                };
                throughput.add(report.blocks as u64);
                debug!(blocks_per_second = throughput.get_throughput(), "Historic progress");
                summary.chunks.push(report);
            }

            let failed = summary.failed_chunks().count();
            info!(
                blocks = summary.blocks(),
                chunks = summary.chunks.len(),
                failed,
                elapsed = ?started.elapsed(),
                "Historic indexing finished"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Follow the chain head until `cancel` fires. Cancellation is honored between chunks only.
    pub async fn live_process(&self, cancel: CancellationToken, skip_db_check: bool) -> IndexerResult<()> {
        let span = info_span!("live", mode = "live");
        async move {
            let mut next = self.starting_height(skip_db_check).await?;
            info!(next, skip_db_check, "Starting live indexing");
            let mut throughput = ThroughputCounter::new(THROUGHPUT_WINDOW);

            loop {
                if cancel.is_cancelled() {
                    info!(next, "Live indexing stopped");
                    return Ok(());
                }

                let head = match self.query.get_latest_block_height().await {
                    Ok(head) => head,
                    Err(e) => {
                        warn!(error = %e, "Could not read the chain head");
                        self.idle(&cancel).await;
                        continue;
                    }
                };

                if next > head {
                    INDEXER_METRICS.live_height_lag.record(0, &[]);
                    debug!(head, "Caught up with the chain head");
                    self.idle(&cancel).await;
                    continue;
                }

                let to = head.min(next.saturating_add(self.config.max_block_chunk_size.max(1) - 1));
                match self.run_chunk(next, to).await {
                    Ok(report) if report.outcome == ChunkOutcome::Processed => {
                        throughput.add(report.blocks as u64);
                        let lag = head - to;
                        INDEXER_METRICS.live_height_lag.record(lag, &[]);
                        info!(
                            from = next,
                            to,
                            lag,
                            blocks_per_second = %format!("{:.2}", throughput.get_throughput()),
                            "Live chunk indexed"
                        );
                        next = to + 1;
                    }
                    Ok(_) => {
                        debug!(from = next, to, "No block available yet, retrying the same range");
                        self.idle(&cancel).await;
                    }
                    // The same range is retried, already written rows are skipped on conflict.
                    Err(e) => {
                        warn!(from = next, to, error = %e, "Live chunk failed, retrying the same range");
                        self.refresh_caches().await;
                        self.idle(&cancel).await;
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn starting_height(&self, skip_db_check: bool) -> IndexerResult<u64> {
        if skip_db_check {
            return Ok(self.query.get_latest_block_height().await?);
        }
        Ok(match self.db.get_last_block_height(&self.config.chain_name).await? {
            Some(height) => height + 1,
            None => 1,
        })
    }

    /// Pick up addresses another writer stored while the failed chunk was in flight.
    async fn refresh_caches(&self) {
        let (accounts, validators) =
            tokio::join!(self.processor.accounts().refresh(), self.processor.validators().refresh());
        if let Err(e) = accounts.and(validators) {
            warn!(error = %e, "Could not refresh the address caches");
        }
    }

    async fn idle(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(self.config.live_pooling) => {}
            _ = cancel.cancelled() => {}
        }
    }

    /// [`Self::process_chunk`] with timing, failure accounting and a `from`/`to` span.
    async fn run_chunk(&self, from: u64, to: u64) -> IndexerResult<ChunkReport> {
        let started = Instant::now();
        let result = self.process_chunk(from, to).instrument(info_span!("chunk", from, to)).await;
        let elapsed = started.elapsed();
        INDEXER_METRICS.chunk_duration.record(elapsed.as_secs_f64(), &[]);

        match &result {
            Ok(report) => {
                debug!(from, to, blocks = report.blocks, transactions = report.transactions, ?elapsed, "Chunk done")
            }
            Err(e) => {
                INDEXER_METRICS.failed_chunks.add(1, &[opentelemetry::KeyValue::new("error_type", e.kind())]);
                error!(from, to, error = %e, ?elapsed, "Chunk failed");
            }
        }
        result
    }

    /// Fetch, transform and persist the blocks in `[from, to]` and their transactions.
    pub async fn process_chunk(&self, from: u64, to: u64) -> IndexerResult<ChunkReport> {
        let blocks = successful(self.query.get_from_to_blocks(from, to).await?);
        if blocks.is_empty() {
            warn!(from, to, "No block fetched for chunk");
            return Ok(ChunkReport::empty(from, to));
        }

        let txs = self.fetch_transactions(&blocks).await;
        let decoded = decode_transactions(&txs);

        let (validators, transactions, messages) = tokio::join!(
            self.processor.process_validator_addresses(&blocks),
            self.processor.process_transactions(&decoded),
            self.processor.process_messages(&decoded),
        );
        let validators = validators?;
        transactions?;
        messages?;
        debug!(?validators, "Phase 1 done");

        let (block_rows, signing_rows) =
            tokio::join!(self.processor.process_blocks(&blocks), self.processor.process_validator_signings(&blocks));
        block_rows?;
        signing_rows?;

        Ok(ChunkReport {
            from,
            to,
            blocks: blocks.len(),
            transactions: txs.len(),
            outcome: ChunkOutcome::Processed,
        })
    }

    async fn fetch_transactions(&self, blocks: &[Block]) -> Vec<TimedTransaction> {
        let timestamps: HashMap<u64, DateTime<Utc>> = blocks.iter().map(|b| (b.height, b.timestamp)).collect();
        let hashes: Vec<String> = blocks.iter().flat_map(|b| b.tx_hashes.iter().cloned()).collect();

        let mut txs = Vec::with_capacity(hashes.len());
        for batch in hashes.chunks(self.config.max_transaction_chunk_size.max(1)) {
            for tx in successful(self.query.get_transactions(batch).await) {
                match timestamps.get(&tx.height) {
                    Some(timestamp) => txs.push(TimedTransaction { timestamp: *timestamp, tx }),
                    None => warn!(tx_hash = %tx.hash, height = tx.height, "Transaction height outside of the chunk"),
                }
            }
        }
        txs
    }
}

/// Split `[from, to]` into consecutive ranges of at most `size` heights.
pub fn chunk_ranges(from: u64, to: u64, size: u64) -> impl Iterator<Item = (u64, u64)> {
    let size = size.max(1);
    let mut next = Some(from).filter(|from| *from <= to);
    std::iter::from_fn(move || {
        let start = next?;
        let end = to.min(start.saturating_add(size - 1));
        next = end.checked_add(1).filter(|n| *n <= to);
        Some((start, end))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 10, 5, vec![(1, 5), (6, 10)])]
    #[case(1, 11, 5, vec![(1, 5), (6, 10), (11, 11)])]
    #[case(7, 7, 100, vec![(7, 7)])]
    #[case(3, 2, 5, vec![])]
    #[case(u64::MAX - 1, u64::MAX, 5, vec![(u64::MAX - 1, u64::MAX)])]
    fn test_chunk_ranges(#[case] from: u64, #[case] to: u64, #[case] size: u64, #[case] expected: Vec<(u64, u64)>) {
        assert_eq!(chunk_ranges(from, to, size).collect::<Vec<_>>(), expected);
    }
}
