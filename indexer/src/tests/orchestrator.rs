use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use rstest::*;
use tokio_util::sync::CancellationToken;

use crate::error::IndexerError;
use crate::orchestrator::ChunkOutcome;
use crate::tests::common::{db, orchestrator, simple_chain, InMemoryDatabase, ScriptedRpc};
use crate::types::AddressRole;

#[rstest]
#[tokio::test]
async fn test_historic_range_is_split_into_chunks(db: Arc<InMemoryDatabase>) {
    let (blocks, txs) = simple_chain(10);
    let rpc = Arc::new(ScriptedRpc::new(blocks, txs));
    let orchestrator = orchestrator(rpc.clone(), db.clone(), 5);

    let summary = orchestrator.historic_process(1, 10).await.unwrap();

    let ranges: Vec<(u64, u64)> = summary.chunks.iter().map(|c| (c.from, c.to)).collect();
    assert_eq!(ranges, vec![(1, 5), (6, 10)]);
    assert!(summary.chunks.iter().all(|c| c.outcome == ChunkOutcome::Processed));
    assert_eq!(summary.blocks(), 10);
    assert_eq!(rpc.block_calls(), 10);

    let state = db.state();
    assert_eq!(state.blocks.len(), 10);
    assert_eq!(state.transactions.len(), 10);
    assert_eq!(state.sends.len(), 10);
    assert_eq!(state.signings.len(), 10);
}

#[rstest]
#[tokio::test]
async fn test_phase_two_only_sees_resolved_validators(db: Arc<InMemoryDatabase>) {
    let (blocks, txs) = simple_chain(6);
    let orchestrator = orchestrator(Arc::new(ScriptedRpc::new(blocks, txs)), db.clone(), 3);

    orchestrator.historic_process(1, 6).await.unwrap();

    let state = db.state();
    let validators = &state.addresses[&AddressRole::Validator];
    assert!(state.blocks.values().all(|b| validators.values().any(|id| *id == b.proposer)));
    assert!(state.signings.iter().all(|s| s.signed_vals.iter().all(|id| *id != 0)));

    // Within a chunk, blocks are written only after the validator addresses were.
    let position = |entry: &str| state.log.iter().position(|e| e == entry).unwrap();
    assert!(position("insert_addresses:validator") < position("insert_blocks"));
    assert!(position("insert_addresses:validator") < position("insert_validator_block_signings"));
}

#[rstest]
#[tokio::test]
async fn test_missing_block_does_not_stall_the_chunk(db: Arc<InMemoryDatabase>) {
    let (blocks, txs) = simple_chain(5);
    let rpc = Arc::new(ScriptedRpc::new(blocks, txs).with_dead_height(3));
    let orchestrator = orchestrator(rpc, db.clone(), 5);

    let summary = orchestrator.historic_process(1, 5).await.unwrap();

    assert_eq!(summary.chunks[0].outcome, ChunkOutcome::Processed);
    assert_eq!(summary.blocks(), 4);
    assert!(!db.state().blocks.contains_key(&3));
}

#[rstest]
#[tokio::test]
async fn test_failed_chunk_does_not_stop_historic_run() {
    let db = Arc::new(InMemoryDatabase::with_state(|state| state.fail_message_inserts = true));
    let (blocks, txs) = simple_chain(4);
    let orchestrator = orchestrator(Arc::new(ScriptedRpc::new(blocks, txs)), db.clone(), 2);

    let summary = orchestrator.historic_process(1, 4).await.unwrap();

    assert_eq!(summary.chunks.len(), 2);
    assert_eq!(summary.failed_chunks().count(), 2);
    assert_matches!(&summary.chunks[0].outcome, ChunkOutcome::Failed(message) if message.contains("bank_msg_send"));
    // Phase 2 never ran, phase 1 writes are kept.
    let state = db.state();
    assert!(state.blocks.is_empty());
    assert_eq!(state.transactions.len(), 4);
}

#[rstest]
#[tokio::test]
async fn test_chunk_without_blocks_is_empty(db: Arc<InMemoryDatabase>) {
    let orchestrator = orchestrator(Arc::new(ScriptedRpc::default()), db.clone(), 5);

    let summary = orchestrator.historic_process(1, 3).await.unwrap();

    assert_eq!(summary.chunks[0].outcome, ChunkOutcome::Empty);
    assert!(db.state().log.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_historic_rejects_inverted_range(db: Arc<InMemoryDatabase>) {
    let orchestrator = orchestrator(Arc::new(ScriptedRpc::default()), db, 5);
    assert_matches!(orchestrator.historic_process(9, 3).await, Err(IndexerError::Validation(_)));
}

#[rstest]
#[tokio::test]
async fn test_reindexing_is_a_no_op(db: Arc<InMemoryDatabase>) {
    let (blocks, txs) = simple_chain(3);
    let orchestrator = orchestrator(Arc::new(ScriptedRpc::new(blocks, txs)), db.clone(), 3);

    orchestrator.historic_process(1, 3).await.unwrap();
    let accounts_before = db.state().addresses[&AddressRole::Account].len();
    orchestrator.historic_process(1, 3).await.unwrap();

    let state = db.state();
    assert_eq!(state.blocks.len(), 3);
    assert_eq!(state.transactions.len(), 3);
    assert_eq!(state.addresses[&AddressRole::Account].len(), accounts_before);
    // The second pass resolves every address from the cache.
    assert_eq!(state.log.iter().filter(|e| e.starts_with("insert_addresses")).count(), 3);
}

async fn wait_for_blocks(db: &InMemoryDatabase, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while db.state().blocks.len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[rstest]
#[tokio::test]
async fn test_live_follows_the_head_until_cancelled(db: Arc<InMemoryDatabase>) {
    let (blocks, txs) = simple_chain(8);
    let rpc = Arc::new(ScriptedRpc::new(blocks, txs));
    rpc.latest.store(4, Ordering::SeqCst);
    let orchestrator = Arc::new(orchestrator(rpc.clone(), db.clone(), 3));
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        async move { orchestrator.live_process(cancel, false).await }
    });

    wait_for_blocks(&db, 4).await;
    rpc.latest.store(8, Ordering::SeqCst);
    wait_for_blocks(&db, 8).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();
    assert_eq!(db.state().blocks.keys().copied().collect::<Vec<_>>(), (1..=8).collect::<Vec<i64>>());
}

#[rstest]
#[tokio::test]
async fn test_live_resumes_after_stored_height(db: Arc<InMemoryDatabase>) {
    let (blocks, txs) = simple_chain(6);
    let rpc = Arc::new(ScriptedRpc::new(blocks, txs));
    let orchestrator = Arc::new(orchestrator(rpc.clone(), db.clone(), 10));
    orchestrator.historic_process(1, 2).await.unwrap();
    let calls_before = rpc.block_calls();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        async move { orchestrator.live_process(cancel, false).await }
    });
    wait_for_blocks(&db, 6).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();

    // Heights 1 and 2 are not fetched again.
    assert_eq!(rpc.block_calls() - calls_before, 4);
}

#[rstest]
#[tokio::test]
async fn test_live_with_skip_db_check_starts_at_head(db: Arc<InMemoryDatabase>) {
    let (blocks, txs) = simple_chain(5);
    let rpc = Arc::new(ScriptedRpc::new(blocks, txs));
    let orchestrator = Arc::new(orchestrator(rpc.clone(), db.clone(), 10));
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        async move { orchestrator.live_process(cancel, true).await }
    });
    wait_for_blocks(&db, 1).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();

    assert_eq!(db.state().blocks.keys().copied().collect::<Vec<_>>(), vec![5]);
}

#[rstest]
#[tokio::test]
async fn test_cancelled_live_run_returns_without_fetching(db: Arc<InMemoryDatabase>) {
    let (blocks, txs) = simple_chain(3);
    let rpc = Arc::new(ScriptedRpc::new(blocks, txs));
    let orchestrator = orchestrator(rpc.clone(), db, 3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    orchestrator.live_process(cancel, false).await.unwrap();
    assert_eq!(rpc.block_calls(), 0);
}
