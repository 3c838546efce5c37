use crate::{FinalizationTracker, IndexerError, OrphanRecorder, TxLifecycleTracker};
use l2scan_storage::{BlockStorageReader, BlockStorageWriter, FinalizationStorage, PendingTxStorage};
use l2scan_types::{FinalizationStatus, L2Block};
use std::sync::Arc;
use tracing::debug;

/// What happened while ingesting one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessedBlock {
    /// The block was not known before.
    pub stored: bool,
    /// Canonical blocks orphaned because this block replaced them.
    pub orphaned: usize,
    /// Ancestors raised to the block's tier.
    pub backfilled: u64,
    /// Tracked transactions that moved forward.
    pub advanced_txs: usize,
}

/// Ingests L2 blocks: reorg handling, persistence, tier recording and transaction lifecycle.
#[derive(Debug)]
pub struct BlockProcessor<S> {
    storage: Arc<S>,
    orphans: OrphanRecorder<S>,
    finality: FinalizationTracker<S>,
    lifecycle: TxLifecycleTracker<S>,
}

impl<S> BlockProcessor<S>
where
    S: BlockStorageReader + BlockStorageWriter + FinalizationStorage + PendingTxStorage,
{
    /// Creates a new [`BlockProcessor`].
    pub const fn new(
        storage: Arc<S>,
        orphans: OrphanRecorder<S>,
        finality: FinalizationTracker<S>,
        lifecycle: TxLifecycleTracker<S>,
    ) -> Self {
        Self { storage, orphans, finality, lifecycle }
    }

    /// The transaction lifecycle tracker fed by this processor.
    pub const fn lifecycle(&self) -> &TxLifecycleTracker<S> {
        &self.lifecycle
    }

    /// Ingests `block` observed by the L2 node at `status`.
    ///
    /// If a different canonical block occupies the same height, the canonical chain from that
    /// height upwards is orphaned first. A block that was already stored is not announced
    /// again. Whenever `status` is a proven tier, the tracked transactions of the block and of
    /// its canonical ancestors are promoted to `proven`.
    pub async fn process(
        &self,
        block: &L2Block,
        status: FinalizationStatus,
    ) -> Result<ProcessedBlock, IndexerError> {
        let mut outcome = ProcessedBlock::default();

        let superseded = self
            .storage
            .get_canonical_block_at(block.height)?
            .is_some_and(|canonical| canonical.hash != block.hash);
        if superseded {
            outcome.orphaned = self.orphans.orphan_from(block.height)?.len();
        }

        outcome.stored = self.storage.store_block(block)?;
        outcome.backfilled = self.finality.record_status(block.hash, block.height, status)?;

        if outcome.stored {
            outcome.advanced_txs = self.lifecycle.on_block(block, status).await?;
        } else {
            debug!(
                target: "orphan_recorder",
                block_hash = %block.hash,
                height = block.height,
                %status,
                "Block already known"
            );
        }

        if status.is_proven() {
            outcome.advanced_txs += self.lifecycle.promote_proven_through(block.height)?;
        }

        if outcome.stored {
            debug!(
                target: "orphan_recorder",
                block_hash = %block.hash,
                height = block.height,
                %status,
                txs = block.tx_hashes.len(),
                orphaned = outcome.orphaned,
                "Processed block"
            );
        }
        Ok(outcome)
    }
}
