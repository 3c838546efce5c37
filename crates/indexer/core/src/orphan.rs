use crate::{Clock, Metrics};
use l2scan_storage::{BlockStorageReader, BlockStorageWriter, StorageError};
use l2scan_types::{BlockHash, OrphanedBlock, Reorg};
use std::sync::Arc;
use tracing::{info, warn};

/// Marks superseded blocks as orphaned and reports reorgs. Blocks are never deleted.
#[derive(Debug)]
pub struct OrphanRecorder<S> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> OrphanRecorder<S>
where
    S: BlockStorageReader + BlockStorageWriter,
{
    /// Creates a new [`OrphanRecorder`].
    pub fn new(storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Orphans the canonical chain from `height` upwards as one reorg.
    pub fn orphan_from(&self, height: u64) -> Result<Vec<OrphanedBlock>, StorageError> {
        let orphaned = self.storage.orphan_canonical_from(height, self.clock.now_ms())?;
        if let Some(root) = orphaned.first() {
            warn!(
                target: "orphan_recorder",
                root_hash = %root.hash,
                root_height = root.height,
                orphaned = orphaned.len(),
                "Reorg detected, canonical blocks orphaned"
            );
            metrics::counter!(Metrics::REORGS_TOTAL).increment(1);
            metrics::counter!(Metrics::ORPHANED_BLOCKS_TOTAL).increment(orphaned.len() as u64);
        }
        Ok(orphaned)
    }

    /// Marks a single block as orphaned.
    pub fn mark_orphaned(
        &self,
        hash: BlockHash,
        has_orphaned_parent: bool,
    ) -> Result<(), StorageError> {
        self.storage.mark_orphaned(hash, self.clock.now_ms(), has_orphaned_parent)?;
        info!(target: "orphan_recorder", block_hash = %hash, has_orphaned_parent, "Block orphaned");
        metrics::counter!(Metrics::ORPHANED_BLOCKS_TOTAL).increment(1);
        Ok(())
    }

    /// Every orphaned block, most recent first.
    pub fn orphaned_blocks(&self) -> Result<Vec<OrphanedBlock>, StorageError> {
        self.storage.get_orphaned_blocks()
    }

    /// Reorg summaries, most recent first.
    pub fn reorgs(&self) -> Result<Vec<Reorg>, StorageError> {
        self.storage.get_reorgs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ManualClock;
    use alloy_primitives::B256;
    use l2scan_storage::IndexerDb;
    use l2scan_types::L2Block;

    #[test]
    fn test_orphans_are_retained_and_grouped() {
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        for h in 1..=3u8 {
            db.store_block(&L2Block::new(B256::repeat_byte(h), h.into(), 0, vec![])).unwrap();
        }
        let clock = ManualClock::new(500);
        let recorder = OrphanRecorder::new(db.clone(), Arc::new(clock.clone()));

        assert_eq!(recorder.orphan_from(2).unwrap().len(), 2);
        assert!(recorder.orphan_from(2).unwrap().is_empty());

        clock.advance(10);
        recorder.mark_orphaned(B256::repeat_byte(1), false).unwrap();

        let reorgs = recorder.reorgs().unwrap();
        assert_eq!(reorgs.len(), 2);
        assert_eq!(reorgs[0].root_height, 1);
        assert_eq!(reorgs[1].root_height, 2);
        assert_eq!(reorgs[1].orphaned_count, 2);

        assert_eq!(recorder.orphaned_blocks().unwrap().len(), 3);
        assert!(db.get_block(B256::repeat_byte(3)).unwrap().is_orphaned());
    }
}
