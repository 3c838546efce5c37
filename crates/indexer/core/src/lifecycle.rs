use crate::EventEmitter;
use l2scan_storage::{PendingTxStorage, StorageError};
use l2scan_types::{
    FinalizationStatus, IndexerEvent, L2Block, NewBlockEvent, PendingTransaction, PendingTxState,
    TxHash,
};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info, warn};

/// States a transaction may leave when it is observed in a block.
const OPEN_STATES: [PendingTxState; 3] =
    [PendingTxState::Pending, PendingTxState::Proposed, PendingTxState::SuspectedDropped];

/// Advances tracked transactions through their lifecycle as blocks arrive.
#[derive(Debug)]
pub struct TxLifecycleTracker<S> {
    storage: Arc<S>,
    emitter: EventEmitter,
}

impl<S> TxLifecycleTracker<S>
where
    S: PendingTxStorage,
{
    /// Creates a new [`TxLifecycleTracker`].
    pub const fn new(storage: Arc<S>, emitter: EventEmitter) -> Self {
        Self { storage, emitter }
    }

    /// Starts tracking a submitted transaction.
    ///
    /// # Returns
    /// * `Ok(false)` if the transaction was already tracked.
    pub fn track_submitted(&self, tx_hash: TxHash, birth_ms: u64) -> Result<bool, StorageError> {
        let tracked = self.storage.insert_pending_tx(&PendingTransaction::new(
            tx_hash,
            birth_ms,
            PendingTxState::Pending,
        ))?;
        if tracked {
            debug!(target: "tx_lifecycle", %tx_hash, birth_ms, "Tracking submitted transaction");
        }
        Ok(tracked)
    }

    /// Flags transactions the aging process considers lost as `suspected_dropped`.
    ///
    /// Untracked transactions and those that can no longer be suspected are ignored.
    pub fn flag_suspected_dropped(&self, tx_hashes: &[TxHash]) -> Result<usize, StorageError> {
        let mut flagged = 0;
        for tx_hash in tx_hashes {
            let Some(tx) = self.storage.get_pending_tx(*tx_hash)? else { continue };
            if !tx.state.can_advance_to(PendingTxState::SuspectedDropped) {
                continue;
            }
            if self.storage.advance_pending_tx(
                *tx_hash,
                tx.state,
                PendingTxState::SuspectedDropped,
            )? {
                flagged += 1;
            }
        }
        if flagged > 0 {
            info!(target: "tx_lifecycle", flagged, "Flagged transactions as suspected dropped");
        }
        Ok(flagged)
    }

    /// Advances the tracked transactions included in `block` and announces the block.
    ///
    /// A `NEW_BLOCK_EVENT` is published exactly once per call, also for empty blocks and when
    /// the transaction update fails.
    ///
    /// # Returns
    /// * `Ok(n)` with the number of transactions that moved forward.
    pub async fn on_block(
        &self,
        block: &L2Block,
        status: FinalizationStatus,
    ) -> Result<usize, StorageError> {
        let advanced = self.advance_included(block, status);

        self.emitter
            .emit(IndexerEvent::NewBlock(NewBlockEvent {
                block_number: block.height,
                block_hash: block.hash,
                timestamp: block.timestamp,
                tx_count: block.tx_hashes.len(),
                finalization_status: status,
            }))
            .await;

        advanced
    }

    /// Promotes tracked transactions included in canonical blocks at or below `height` to
    /// `proven`.
    ///
    /// A block reaching a proven tier raises its canonical ancestors with it, so their
    /// transactions are promoted as well.
    ///
    /// # Returns
    /// * `Ok(n)` with the number of promoted transactions.
    pub fn promote_proven_through(&self, height: u64) -> Result<usize, StorageError> {
        let mut promoted = 0;
        for tx in self.storage.get_pending_txs_included_through(height, &OPEN_STATES)? {
            if self.storage.advance_pending_tx(tx.tx_hash, tx.state, PendingTxState::Proven)? {
                promoted += 1;
                debug!(
                    target: "tx_lifecycle",
                    tx_hash = %tx.tx_hash,
                    from = %tx.state,
                    through = height,
                    "Transaction proven"
                );
            }
        }
        if promoted > 0 {
            info!(target: "tx_lifecycle", promoted, through = height, "Promoted proven transactions");
        }
        Ok(promoted)
    }

    fn advance_included(
        &self,
        block: &L2Block,
        status: FinalizationStatus,
    ) -> Result<usize, StorageError> {
        if block.tx_hashes.is_empty() {
            return Ok(0);
        }

        let included: HashSet<_> = block.tx_hashes.iter().copied().collect();
        let target = PendingTxState::from_inclusion(status);
        let mut advanced = 0;

        for tx in self.storage.get_pending_txs_in_states(&OPEN_STATES)? {
            if !included.contains(&tx.tx_hash) || !tx.state.can_advance_to(target) {
                continue;
            }
            if self.storage.advance_pending_tx(tx.tx_hash, tx.state, target)? {
                advanced += 1;
                debug!(
                    target: "tx_lifecycle",
                    tx_hash = %tx.tx_hash,
                    from = %tx.state,
                    to = %target,
                    block_number = block.height,
                    "Transaction advanced"
                );
            } else {
                warn!(
                    target: "tx_lifecycle",
                    tx_hash = %tx.tx_hash,
                    expected = %tx.state,
                    "Transaction changed state concurrently, skipping"
                );
            }
        }

        Ok(advanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingBus;
    use alloy_primitives::B256;
    use l2scan_storage::{BlockStorageWriter, IndexerDb};
    use l2scan_types::{DroppedTx, NEW_BLOCK_EVENT};
    use mockall::mock;

    mock!(
        #[derive(Debug)]
        pub Db {}

        impl PendingTxStorage for Db {
            fn insert_pending_tx(&self, tx: &PendingTransaction) -> Result<bool, StorageError>;
            fn get_pending_tx(&self, hash: TxHash) -> Result<Option<PendingTransaction>, StorageError>;
            fn get_pending_txs_in_states(&self, states: &[PendingTxState]) -> Result<Vec<PendingTransaction>, StorageError>;
            fn get_pending_txs_included_through(&self, height: u64, states: &[PendingTxState]) -> Result<Vec<PendingTransaction>, StorageError>;
            fn advance_pending_tx(&self, hash: TxHash, from: PendingTxState, to: PendingTxState) -> Result<bool, StorageError>;
            fn confirm_dropped(&self, dropped: &[DroppedTx]) -> Result<Vec<DroppedTx>, StorageError>;
            fn get_dropped_tx(&self, hash: TxHash) -> Result<Option<DroppedTx>, StorageError>;
        }
    );

    fn tx(n: u8) -> TxHash {
        B256::repeat_byte(n)
    }

    fn tracker<S: PendingTxStorage>(storage: Arc<S>) -> (TxLifecycleTracker<S>, Arc<RecordingBus>) {
        let bus = Arc::new(RecordingBus::default());
        (TxLifecycleTracker::new(storage, EventEmitter::new(bus.clone())), bus)
    }

    #[tokio::test]
    async fn test_block_seen_proposed_advances_matching_txs() {
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        db.insert_pending_tx(&PendingTransaction::new(tx(1), 1, PendingTxState::Pending)).unwrap();
        db.insert_pending_tx(&PendingTransaction::new(tx(2), 2, PendingTxState::SuspectedDropped))
            .unwrap();
        db.insert_pending_tx(&PendingTransaction::new(tx(3), 3, PendingTxState::Pending)).unwrap();
        let (tracker, bus) = tracker(db.clone());

        let block = L2Block::new(B256::repeat_byte(0xb0), 100, 1_000, vec![tx(1), tx(2)]);
        let advanced =
            tracker.on_block(&block, FinalizationStatus::L2NodeSeenProposed).await.unwrap();

        assert_eq!(advanced, 2);
        assert_eq!(db.get_pending_tx(tx(1)).unwrap().unwrap().state, PendingTxState::Proposed);
        assert_eq!(db.get_pending_tx(tx(2)).unwrap().unwrap().state, PendingTxState::Proposed);
        assert_eq!(db.get_pending_tx(tx(3)).unwrap().unwrap().state, PendingTxState::Pending);

        let published = bus.published_on(NEW_BLOCK_EVENT);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["blockNumber"], 100);
        assert_eq!(published[0]["txCount"], 2);
    }

    #[tokio::test]
    async fn test_proven_block_never_demotes() {
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        db.insert_pending_tx(&PendingTransaction::new(tx(1), 1, PendingTxState::Pending)).unwrap();
        let (tracker, _) = tracker(db.clone());

        let block = L2Block::new(B256::repeat_byte(0xb1), 5, 1, vec![tx(1)]);
        tracker.on_block(&block, FinalizationStatus::L2NodeSeenProven).await.unwrap();
        assert_eq!(db.get_pending_tx(tx(1)).unwrap().unwrap().state, PendingTxState::Proven);

        // an older, lower tier observation of the same block changes nothing
        assert_eq!(
            tracker.on_block(&block, FinalizationStatus::L2NodeSeenProposed).await.unwrap(),
            0
        );
        assert_eq!(db.get_pending_tx(tx(1)).unwrap().unwrap().state, PendingTxState::Proven);
    }

    #[tokio::test]
    async fn test_empty_block_still_announced() {
        let mut db = MockDb::new();
        db.expect_get_pending_txs_in_states().never();
        let (tracker, bus) = tracker(Arc::new(db));

        let block = L2Block::new(B256::ZERO, 7, 1, vec![]);
        assert_eq!(tracker.on_block(&block, FinalizationStatus::Finalized).await.unwrap(), 0);
        assert_eq!(bus.published_on(NEW_BLOCK_EVENT).len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_still_announces_block() {
        let mut db = MockDb::new();
        db.expect_get_pending_txs_in_states()
            .returning(|_| Err(StorageError::EntryNotFound("boom".into())));
        let (tracker, bus) = tracker(Arc::new(db));

        let block = L2Block::new(B256::ZERO, 8, 1, vec![tx(1)]);
        assert!(tracker.on_block(&block, FinalizationStatus::L1MinedProposed).await.is_err());
        assert_eq!(bus.published_on(NEW_BLOCK_EVENT).len(), 1);
    }

    #[test]
    fn test_promote_proven_through_covers_ancestors() {
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        for (n, state) in [
            (1, PendingTxState::Proposed),
            (2, PendingTxState::SuspectedDropped),
            (3, PendingTxState::Proposed),
        ] {
            db.insert_pending_tx(&PendingTransaction::new(tx(n), 1, state)).unwrap();
        }
        for (height, txs) in [(1, vec![tx(1)]), (2, vec![tx(2)]), (3, vec![tx(3)])] {
            db.store_block(&L2Block::new(B256::repeat_byte(0xc0 + height as u8), height, 1, txs))
                .unwrap();
        }
        let (tracker, bus) = tracker(db.clone());

        assert_eq!(tracker.promote_proven_through(2).unwrap(), 2);
        assert_eq!(db.get_pending_tx(tx(1)).unwrap().unwrap().state, PendingTxState::Proven);
        assert_eq!(db.get_pending_tx(tx(2)).unwrap().unwrap().state, PendingTxState::Proven);
        assert_eq!(db.get_pending_tx(tx(3)).unwrap().unwrap().state, PendingTxState::Proposed);
        assert_eq!(tracker.promote_proven_through(2).unwrap(), 0);
        assert!(bus.published().is_empty());
    }

    #[test]
    fn test_flag_suspected_dropped() {
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        db.insert_pending_tx(&PendingTransaction::new(tx(1), 1, PendingTxState::Pending)).unwrap();
        db.insert_pending_tx(&PendingTransaction::new(tx(2), 1, PendingTxState::Proven)).unwrap();
        let (tracker, _) = tracker(db.clone());

        assert!(!tracker.track_submitted(tx(1), 99).unwrap());
        assert!(tracker.track_submitted(tx(4), 99).unwrap());

        assert_eq!(tracker.flag_suspected_dropped(&[tx(1), tx(2), tx(3)]).unwrap(), 1);
        assert_eq!(
            db.get_pending_tx(tx(1)).unwrap().unwrap().state,
            PendingTxState::SuspectedDropped
        );
        assert_eq!(db.get_pending_tx(tx(2)).unwrap().unwrap().state, PendingTxState::Proven);
    }
}
