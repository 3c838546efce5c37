use crate::{
    BlockProcessor, ChainReader, CursorTracker, FetchPipeline, FinalizationTracker, IndexerError,
    PollWindow,
};
use alloy_primitives::Address;
use l2scan_storage::{
    BlockStorageReader, BlockStorageWriter, CursorStorage, FinalizationStorage, PendingTxStorage,
};
use l2scan_types::{FinalizationStatus, HeightCursorKey};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Summary of one ingestion tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Blocks handed to the processor, including the re-checked tip.
    pub processed: usize,
    /// Blocks that were not known before.
    pub stored: usize,
    /// Canonical blocks orphaned during the tick.
    pub orphaned: usize,
    /// Next height to fetch after the tick.
    pub cursor: u64,
}

/// Walks the L2 node's blocks from the stream cursor towards its latest height.
#[derive(Debug)]
pub struct L2BlockIngester<R, S> {
    key: HeightCursorKey,
    chain: Arc<R>,
    storage: Arc<S>,
    cursors: CursorTracker<S>,
    pipeline: FetchPipeline,
    processor: BlockProcessor<S>,
    finality: FinalizationTracker<S>,
    chunk_size: u64,
    genesis_height: u64,
}

impl<R, S> L2BlockIngester<R, S>
where
    R: ChainReader,
    S: BlockStorageReader
        + BlockStorageWriter
        + CursorStorage
        + FinalizationStorage
        + PendingTxStorage,
{
    /// Cursor key of the L2 block stream.
    pub fn cursor_key() -> HeightCursorKey {
        HeightCursorKey::new("l2_node", Address::ZERO, "block", false)
    }

    /// Creates a new [`L2BlockIngester`] whose cursor starts at `genesis_height`.
    pub fn new(
        chain: Arc<R>,
        storage: Arc<S>,
        pipeline: FetchPipeline,
        processor: BlockProcessor<S>,
        finality: FinalizationTracker<S>,
        chunk_size: u64,
        genesis_height: u64,
    ) -> Self {
        Self {
            key: Self::cursor_key(),
            cursors: CursorTracker::new(storage.clone(), genesis_height),
            chain,
            storage,
            pipeline,
            processor,
            finality,
            chunk_size,
            genesis_height,
        }
    }

    /// The processor blocks are handed to.
    pub const fn processor(&self) -> &BlockProcessor<S> {
        &self.processor
    }

    /// Fetches and processes the next window of blocks.
    ///
    /// The block just below the cursor is fetched again so a replaced tip is detected. Blocks
    /// are processed in height order and processing stops at the first height that could not
    /// be fetched; the cursor only moves past processed heights.
    pub async fn tick(&self) -> Result<IngestSummary, IndexerError> {
        let latest = self.pipeline.fetch(|| self.chain.get_latest_height()).await?;
        let proven = self.pipeline.fetch(|| self.chain.get_latest_proven_height()).await?;
        let from = self.cursors.get_cursor(&self.key)?;

        let mut summary = IngestSummary { cursor: from, ..Default::default() };
        if let Some(window) = PollWindow::capped(from, latest, self.chunk_size) {
            self.ingest(window, proven, &mut summary).await?;
        } else {
            debug!(target: "event_poller", stream = %self.key, latest, "L2 blocks up to date");
        }

        self.mark_proven(proven)?;
        Ok(summary)
    }

    async fn ingest(
        &self,
        window: PollWindow,
        proven: u64,
        summary: &mut IngestSummary,
    ) -> Result<(), IndexerError> {
        let recheck = window.from.saturating_sub(1).max(self.genesis_height);
        let heights: Vec<u64> = (recheck.min(window.from)..=window.to).collect();
        let fetched = self.pipeline.fetch_batched(heights, |height| self.chain.get_block(height)).await;

        let mut next = recheck.min(window.from);
        for block in &fetched.values {
            if block.height != next {
                break;
            }
            let status = if block.height <= proven {
                FinalizationStatus::L2NodeSeenProven
            } else {
                FinalizationStatus::L2NodeSeenProposed
            };
            let outcome = self.processor.process(block, status).await?;
            summary.processed += 1;
            summary.stored += usize::from(outcome.stored);
            summary.orphaned += outcome.orphaned;
            next += 1;
        }

        if next <= window.to {
            warn!(
                target: "event_poller",
                stream = %self.key,
                height = next,
                failed = fetched.failed.len(),
                unfetched = fetched.unfetched.len(),
                "Stopped at a block that could not be fetched"
            );
        }

        if next > window.from {
            self.cursors.set_cursor(&self.key, next)?;
            summary.cursor = next;
        }

        if summary.stored > 0 || summary.orphaned > 0 {
            info!(
                target: "event_poller",
                stream = %self.key,
                from = window.from,
                to = next - 1,
                stored = summary.stored,
                orphaned = summary.orphaned,
                "Ingested L2 blocks"
            );
        }
        Ok(())
    }

    fn mark_proven(&self, proven: u64) -> Result<(), IndexerError> {
        if proven < self.genesis_height {
            return Ok(());
        }
        let Some(block) = self.storage.get_canonical_block_at(proven)? else {
            debug!(target: "finality", height = proven, "Proven block not ingested yet");
            return Ok(());
        };
        self.finality.record_status(block.hash, block.height, FinalizationStatus::L2NodeSeenProven)?;
        self.processor.lifecycle().promote_proven_through(block.height)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CircuitBreaker, EventEmitter, FetchConfig, OrphanRecorder, TxLifecycleTracker,
        test_utils::{FakeChain, ManualClock, RecordingBus},
    };
    use alloy_primitives::B256;
    use l2scan_storage::IndexerDb;
    use l2scan_types::{L2Block, NEW_BLOCK_EVENT, PendingTransaction, PendingTxState};

    fn block(height: u64, fork: u8) -> L2Block {
        let mut hash = B256::left_padding_from(&height.to_be_bytes());
        hash.0[0] = fork;
        L2Block::new(hash, height, 1_000 + height, vec![])
    }

    fn ingester(
        chain: Arc<FakeChain>,
        db: Arc<IndexerDb>,
        chunk_size: u64,
    ) -> (L2BlockIngester<FakeChain, IndexerDb>, Arc<RecordingBus>) {
        let clock = Arc::new(ManualClock::new(10_000));
        let bus = Arc::new(RecordingBus::default());
        let config = FetchConfig::default();
        let breaker = CircuitBreaker::new(
            "l2_blocks",
            config.circuit_breaker_threshold,
            config.circuit_breaker_timeout,
            clock.clone(),
        );
        let finality = FinalizationTracker::new(db.clone(), clock.clone());
        let processor = BlockProcessor::new(
            db.clone(),
            OrphanRecorder::new(db.clone(), clock),
            finality.clone(),
            TxLifecycleTracker::new(db.clone(), EventEmitter::new(bus.clone())),
        );
        let ingester = L2BlockIngester::new(
            chain,
            db,
            FetchPipeline::new("l2_blocks", config, breaker),
            processor,
            finality,
            chunk_size,
            1,
        );
        (ingester, bus)
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_ingests_with_node_tiers() {
        let chain = Arc::new(FakeChain::default());
        for height in 1..=3 {
            chain.push_block(block(height, 0));
        }
        chain.set_proven_height(2);
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        let (ingester, bus) = ingester(chain, db.clone(), 100);

        let summary = ingester.tick().await.unwrap();
        assert_eq!(summary.stored, 3);
        assert_eq!(summary.cursor, 4);

        let status = |height: u64| db.get_block_status(block(height, 0).hash).unwrap();
        assert_eq!(status(1), Some(FinalizationStatus::L2NodeSeenProven));
        assert_eq!(status(2), Some(FinalizationStatus::L2NodeSeenProven));
        assert_eq!(status(3), Some(FinalizationStatus::L2NodeSeenProposed));
        assert_eq!(bus.published_on(NEW_BLOCK_EVENT).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_respects_chunk_size() {
        let chain = Arc::new(FakeChain::default());
        for height in 1..=5 {
            chain.push_block(block(height, 0));
        }
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        let (ingester, _) = ingester(chain, db, 2);

        assert_eq!(ingester.tick().await.unwrap().cursor, 3);
        assert_eq!(ingester.tick().await.unwrap().cursor, 5);
        assert_eq!(ingester.tick().await.unwrap().cursor, 6);
        assert_eq!(ingester.tick().await.unwrap().stored, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_tip_is_orphaned() {
        let chain = Arc::new(FakeChain::default());
        chain.push_block(block(1, 0));
        chain.push_block(block(2, 0));
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        let (ingester, _) = ingester(chain.clone(), db.clone(), 100);
        ingester.tick().await.unwrap();

        chain.push_block(block(2, 1));
        chain.push_block(block(3, 1));
        let summary = ingester.tick().await.unwrap();
        assert_eq!(summary.orphaned, 1);
        assert_eq!(summary.cursor, 4);

        assert_eq!(db.get_canonical_block_at(2).unwrap(), Some(block(2, 1)));
        let orphaned = db.get_orphaned_blocks().unwrap();
        assert_eq!(orphaned.len(), 1);
        assert_eq!(orphaned[0].hash, block(2, 0).hash);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_stops_at_unfetchable_height() {
        let chain = Arc::new(FakeChain::default());
        for height in 1..=4 {
            chain.push_block(block(height, 0));
        }
        chain.fail_height(3);
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        let (ingester, _) = ingester(chain, db.clone(), 100);

        let summary = ingester.tick().await.unwrap();
        assert_eq!(summary.cursor, 3);
        assert_eq!(db.get_canonical_block_at(4).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_proposed_tx_promoted_once_block_is_proven() {
        let tx_hash = B256::repeat_byte(0x42);
        let chain = Arc::new(FakeChain::default());
        let mut first = block(1, 0);
        first.tx_hashes = vec![tx_hash];
        chain.push_block(first);
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        db.insert_pending_tx(&PendingTransaction::new(tx_hash, 0, PendingTxState::Pending)).unwrap();
        let (ingester, _) = ingester(chain.clone(), db.clone(), 100);

        ingester.tick().await.unwrap();
        assert_eq!(db.get_pending_tx(tx_hash).unwrap().unwrap().state, PendingTxState::Proposed);

        chain.set_proven_height(1);
        ingester.tick().await.unwrap();
        ingester.tick().await.unwrap();
        assert_eq!(db.get_pending_tx(tx_hash).unwrap().unwrap().state, PendingTxState::Proven);
    }

    #[tokio::test(start_paused = true)]
    async fn test_proven_head_backfills_ancestors() {
        let chain = Arc::new(FakeChain::default());
        for height in 1..=3 {
            chain.push_block(block(height, 0));
        }
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        let (ingester, _) = ingester(chain.clone(), db.clone(), 100);
        ingester.tick().await.unwrap();

        chain.set_proven_height(3);
        ingester.tick().await.unwrap();
        for height in 1..=3 {
            assert_eq!(
                db.get_block_status(block(height, 0).hash).unwrap(),
                Some(FinalizationStatus::L2NodeSeenProven)
            );
        }
    }
}
