use crate::{
    ChainReader, Clock, DroppedTxConfig, EventEmitter, FetchPipeline, IndexerError, Metrics,
};
use l2scan_storage::PendingTxStorage;
use l2scan_types::{DroppedTx, DroppedTxsEvent, IndexerEvent, PendingTxState, TxHash};
use std::{collections::HashSet, ops::RangeInclusive, sync::Arc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of one verifier sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Suspected drops old enough to be verified.
    pub checked: usize,
    /// Transactions found in a recent block and marked proven.
    pub recovered: usize,
    /// Transactions confirmed as dropped.
    pub dropped: usize,
    /// Heights that could not be fetched.
    pub skipped_heights: usize,
}

/// Periodically resolves long-stuck suspected drops by rescanning recent proven blocks.
#[derive(Debug)]
pub struct DroppedTxVerifier<R, S> {
    config: DroppedTxConfig,
    chain: Arc<R>,
    storage: Arc<S>,
    pipeline: FetchPipeline,
    emitter: EventEmitter,
    clock: Arc<dyn Clock>,
}

impl<R, S> DroppedTxVerifier<R, S>
where
    R: ChainReader,
    S: PendingTxStorage,
{
    /// Creates a new [`DroppedTxVerifier`].
    pub fn new(
        config: DroppedTxConfig,
        chain: Arc<R>,
        storage: Arc<S>,
        pipeline: FetchPipeline,
        emitter: EventEmitter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { config, chain, storage, pipeline, emitter, clock }
    }

    /// Heights rescanned for a latest proven height of `latest`.
    pub fn lookback_window(&self, latest: u64) -> RangeInclusive<u64> {
        let start = latest.saturating_sub(self.config.block_lookback).saturating_add(1).max(1);
        start..=latest
    }

    /// Runs one sweep. Never fails: unexpected errors are logged and an empty summary returned.
    pub async fn sweep(&self) -> SweepSummary {
        let started = Instant::now();
        let summary = match self.try_sweep().await {
            Ok(summary) => summary,
            Err(err) => {
                error!(target: "dropped_tx_verifier", %err, "Dropped transaction sweep failed");
                SweepSummary::default()
            }
        };
        metrics::histogram!(Metrics::SWEEP_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        summary
    }

    async fn try_sweep(&self) -> Result<SweepSummary, IndexerError> {
        let suspected =
            self.storage.get_pending_txs_in_states(&[PendingTxState::SuspectedDropped])?;
        if suspected.is_empty() {
            debug!(target: "dropped_tx_verifier", "No suspected drops");
            return Ok(SweepSummary::default());
        }

        let now = self.clock.now_ms();
        let aged: Vec<_> = suspected
            .into_iter()
            .filter(|tx| tx.age_ms(now) >= self.config.age_threshold_ms)
            .collect();
        if aged.is_empty() {
            debug!(target: "dropped_tx_verifier", "No suspected drop is old enough");
            return Ok(SweepSummary::default());
        }

        let latest = self.pipeline.fetch(|| self.chain.get_latest_proven_height()).await?;
        let window = self.lookback_window(latest);
        let (included, skipped_heights) = self.collect_included(window.clone()).await;

        let mut summary = SweepSummary { checked: aged.len(), skipped_heights, ..Default::default() };
        let mut absent = Vec::new();
        for tx in aged {
            if !included.contains(&tx.tx_hash) {
                absent.push(DroppedTx::new(tx.tx_hash, tx.birth_timestamp, now));
                continue;
            }
            if self.storage.advance_pending_tx(
                tx.tx_hash,
                PendingTxState::SuspectedDropped,
                PendingTxState::Proven,
            )? {
                summary.recovered += 1;
                debug!(target: "dropped_tx_verifier", tx_hash = %tx.tx_hash, "Suspected drop found in a block");
            }
        }

        let dropped = if absent.is_empty() { absent } else { self.storage.confirm_dropped(&absent)? };
        summary.dropped = dropped.len();
        if !dropped.is_empty() {
            self.emitter.emit(IndexerEvent::DroppedTxs(DroppedTxsEvent { txs: dropped })).await;
        }

        metrics::counter!(Metrics::RECOVERED_TXS_TOTAL).increment(summary.recovered as u64);
        metrics::counter!(Metrics::DROPPED_TXS_TOTAL).increment(summary.dropped as u64);
        info!(
            target: "dropped_tx_verifier",
            from = window.start(),
            to = window.end(),
            checked = summary.checked,
            recovered = summary.recovered,
            dropped = summary.dropped,
            skipped_heights = summary.skipped_heights,
            "Dropped transaction sweep finished"
        );
        Ok(summary)
    }

    /// Transaction hashes included in the blocks of `window`, and the number of heights that
    /// could not be fetched.
    async fn collect_included(&self, window: RangeInclusive<u64>) -> (HashSet<TxHash>, usize) {
        let fetched = self
            .pipeline
            .fetch_batched(window.collect(), |height| self.chain.get_block(height))
            .await;

        for (height, err) in &fetched.failed {
            warn!(target: "dropped_tx_verifier", height, %err, "Failed to fetch block, skipping height");
        }
        if !fetched.unfetched.is_empty() {
            warn!(
                target: "dropped_tx_verifier",
                heights = fetched.unfetched.len(),
                "Block batches could not be fetched, skipping heights"
            );
        }

        let skipped = fetched.failed.len() + fetched.unfetched.len();
        let included =
            fetched.values.into_iter().flat_map(|block| block.tx_hashes).collect::<HashSet<_>>();
        (included, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CircuitBreaker, FetchConfig,
        test_utils::{FakeChain, ManualClock, RecordingBus},
    };
    use alloy_primitives::B256;
    use l2scan_storage::{IndexerDb, StorageError};
    use l2scan_types::{DROPPED_TXS_EVENT, L2Block, PendingTransaction};
    use std::sync::atomic::{AtomicBool, Ordering};

    const NOW: u64 = 1_000_000;

    struct Harness {
        chain: Arc<FakeChain>,
        db: Arc<IndexerDb>,
        bus: Arc<RecordingBus>,
        verifier: DroppedTxVerifier<FakeChain, IndexerDb>,
    }

    /// Delegates to an in-memory database and fails the next drop confirmation on request.
    #[derive(Debug)]
    struct FailingConfirm {
        db: IndexerDb,
        fail_next: AtomicBool,
    }

    impl PendingTxStorage for FailingConfirm {
        fn insert_pending_tx(&self, tx: &PendingTransaction) -> Result<bool, StorageError> {
            self.db.insert_pending_tx(tx)
        }

        fn get_pending_tx(&self, hash: TxHash) -> Result<Option<PendingTransaction>, StorageError> {
            self.db.get_pending_tx(hash)
        }

        fn get_pending_txs_in_states(
            &self,
            states: &[PendingTxState],
        ) -> Result<Vec<PendingTransaction>, StorageError> {
            self.db.get_pending_txs_in_states(states)
        }

        fn get_pending_txs_included_through(
            &self,
            height: u64,
            states: &[PendingTxState],
        ) -> Result<Vec<PendingTransaction>, StorageError> {
            self.db.get_pending_txs_included_through(height, states)
        }

        fn advance_pending_tx(
            &self,
            hash: TxHash,
            from: PendingTxState,
            to: PendingTxState,
        ) -> Result<bool, StorageError> {
            self.db.advance_pending_tx(hash, from, to)
        }

        fn confirm_dropped(&self, dropped: &[DroppedTx]) -> Result<Vec<DroppedTx>, StorageError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(StorageError::ConflictError("database is locked".into()));
            }
            self.db.confirm_dropped(dropped)
        }

        fn get_dropped_tx(&self, hash: TxHash) -> Result<Option<DroppedTx>, StorageError> {
            self.db.get_dropped_tx(hash)
        }
    }

    fn verifier<S: PendingTxStorage>(
        chain: Arc<FakeChain>,
        storage: Arc<S>,
        bus: Arc<RecordingBus>,
        lookback: u64,
    ) -> DroppedTxVerifier<FakeChain, S> {
        let clock = Arc::new(ManualClock::new(NOW));
        let fetch = FetchConfig::default();
        let breaker = CircuitBreaker::new(
            "verifier",
            fetch.circuit_breaker_threshold,
            fetch.circuit_breaker_timeout,
            clock.clone(),
        );
        DroppedTxVerifier::new(
            DroppedTxConfig { age_threshold_ms: 300_000, block_lookback: lookback },
            chain,
            storage,
            FetchPipeline::new("verifier", fetch, breaker),
            EventEmitter::new(bus),
            clock,
        )
    }

    fn harness(lookback: u64) -> Harness {
        let chain = Arc::new(FakeChain::default());
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        let bus = Arc::new(RecordingBus::default());
        let verifier = verifier(chain.clone(), db.clone(), bus.clone(), lookback);
        Harness { chain, db, bus, verifier }
    }

    fn suspect(db: &IndexerDb, seed: u8, age_ms: u64) -> B256 {
        let hash = B256::repeat_byte(seed);
        db.insert_pending_tx(&PendingTransaction::new(
            hash,
            NOW - age_ms,
            PendingTxState::SuspectedDropped,
        ))
        .unwrap();
        hash
    }

    fn block(height: u64, txs: Vec<B256>) -> L2Block {
        L2Block::new(B256::left_padding_from(&height.to_be_bytes()), height, height, txs)
    }

    #[test]
    fn test_lookback_window_is_clamped_at_one() {
        let h = harness(10);
        assert_eq!(h.verifier.lookback_window(2), 1..=2);
        assert_eq!(h.verifier.lookback_window(100), 91..=100);
        assert!(h.verifier.lookback_window(0).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_chain_never_requests_height_zero() {
        let h = harness(10);
        suspect(&h.db, 1, 400_000);
        h.chain.push_block(block(1, vec![]));
        h.chain.push_block(block(2, vec![]));
        h.chain.set_proven_height(2);

        h.verifier.sweep().await;
        let mut requested = h.chain.requested_heights();
        requested.sort_unstable();
        assert_eq!(requested, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_aged_tx_is_dropped() {
        let h = harness(100);
        let tx = suspect(&h.db, 1, 310_000);
        h.chain.push_block(block(1, vec![B256::repeat_byte(0x77)]));
        h.chain.set_proven_height(1);

        let summary = h.verifier.sweep().await;
        assert_eq!(summary, SweepSummary { checked: 1, dropped: 1, ..Default::default() });

        assert_eq!(h.db.get_pending_tx(tx).unwrap(), None);
        assert_eq!(
            h.db.get_dropped_tx(tx).unwrap(),
            Some(DroppedTx::new(tx, NOW - 310_000, NOW))
        );
        let events = h.bus.published_on(DROPPED_TXS_EVENT);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["txs"].as_array().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_aged_tx_is_recovered() {
        let h = harness(100);
        let tx = suspect(&h.db, 1, 310_000);
        h.chain.push_block(block(1, vec![tx]));
        h.chain.set_proven_height(1);

        let summary = h.verifier.sweep().await;
        assert_eq!(summary.recovered, 1);
        assert_eq!(summary.dropped, 0);
        assert_eq!(h.db.get_pending_tx(tx).unwrap().unwrap().state, PendingTxState::Proven);
        assert!(h.bus.published_on(DROPPED_TXS_EVENT).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_young_suspects_are_left_alone() {
        let h = harness(100);
        let tx = suspect(&h.db, 1, 299_999);
        h.chain.set_proven_height(1);

        assert_eq!(h.verifier.sweep().await, SweepSummary::default());
        assert!(h.chain.requested_heights().is_empty());
        assert_eq!(
            h.db.get_pending_tx(tx).unwrap().unwrap().state,
            PendingTxState::SuspectedDropped
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_height_is_skipped() {
        let h = harness(100);
        let recovered = suspect(&h.db, 1, 400_000);
        let lost = suspect(&h.db, 2, 400_000);
        h.chain.push_block(block(1, vec![]));
        h.chain.push_block(block(2, vec![]));
        h.chain.push_block(block(3, vec![recovered]));
        h.chain.fail_height(2);
        h.chain.set_proven_height(3);

        let summary = h.verifier.sweep().await;
        assert_eq!(summary.skipped_heights, 1);
        assert_eq!(summary.recovered, 1);
        assert_eq!(summary.dropped, 1);
        assert_eq!(h.db.get_pending_tx(recovered).unwrap().unwrap().state, PendingTxState::Proven);
        assert!(h.db.get_dropped_tx(lost).unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_confirmation_is_retried_next_sweep() {
        let chain = Arc::new(FakeChain::default());
        chain.push_block(block(1, vec![]));
        chain.set_proven_height(1);
        let storage = Arc::new(FailingConfirm {
            db: IndexerDb::in_memory().unwrap(),
            fail_next: AtomicBool::new(true),
        });
        let bus = Arc::new(RecordingBus::default());
        let verifier = verifier(chain, storage.clone(), bus.clone(), 100);
        let tx = suspect(&storage.db, 1, 400_000);

        assert_eq!(verifier.sweep().await, SweepSummary::default());
        assert_eq!(
            storage.get_pending_tx(tx).unwrap().unwrap().state,
            PendingTxState::SuspectedDropped
        );
        assert_eq!(storage.get_dropped_tx(tx).unwrap(), None);
        assert!(bus.published_on(DROPPED_TXS_EVENT).is_empty());

        let summary = verifier.sweep().await;
        assert_eq!(summary, SweepSummary { checked: 1, dropped: 1, ..Default::default() });
        assert_eq!(storage.get_pending_tx(tx).unwrap(), None);
        assert!(storage.get_dropped_tx(tx).unwrap().is_some());
        assert_eq!(bus.published_on(DROPPED_TXS_EVENT).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_chain_is_logged_not_raised() {
        let h = harness(100);
        let tx = suspect(&h.db, 1, 400_000);
        h.chain.fail_proven_height(true);

        assert_eq!(h.verifier.sweep().await, SweepSummary::default());
        assert_eq!(
            h.db.get_pending_tx(tx).unwrap().unwrap().state,
            PendingTxState::SuspectedDropped
        );
    }
}
