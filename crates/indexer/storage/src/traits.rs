use crate::StorageError;
use alloy_primitives::Address;
use auto_impl::auto_impl;
use l2scan_types::{
    BlockHash, DroppedTx, FinalizationStatus, FinalizationStatusRecord, HeightCursorKey, L2Block,
    OrphanedBlock, PendingTransaction, PendingTxState, Reorg, TxHash, ValidatorRecord,
};
use std::fmt::Debug;

/// Read access to persisted L2 blocks.
///
/// Unless stated otherwise, queries only consider canonical (non-orphaned) blocks.
#[auto_impl(&, Arc)]
pub trait BlockStorageReader {
    /// Gets a block, canonical or orphaned, by its hash.
    ///
    /// # Returns
    /// * `Ok(L2Block)` with its included transaction hashes if it exists.
    /// * `Err(StorageError::EntryNotFound)` if the block is unknown.
    fn get_block(&self, hash: BlockHash) -> Result<L2Block, StorageError>;

    /// Gets the canonical block at the given height, if any.
    fn get_canonical_block_at(&self, height: u64) -> Result<Option<L2Block>, StorageError>;

    /// Gets the highest stored block.
    ///
    /// # Arguments
    /// * `include_orphaned` - whether orphaned blocks are eligible.
    fn get_latest_block(&self, include_orphaned: bool) -> Result<Option<L2Block>, StorageError>;

    /// Lists every orphaned block, most recent reorg first.
    fn get_orphaned_blocks(&self) -> Result<Vec<OrphanedBlock>, StorageError>;

    /// Groups orphaned blocks into reorgs, most recent first.
    fn get_reorgs(&self) -> Result<Vec<Reorg>, StorageError>;
}

/// Write access to persisted L2 blocks.
#[auto_impl(&, Arc)]
pub trait BlockStorageWriter {
    /// Stores a block and its included transaction hashes atomically.
    ///
    /// # Returns
    /// * `Ok(true)` if the block was inserted.
    /// * `Ok(false)` if a block with the same hash already existed.
    fn store_block(&self, block: &L2Block) -> Result<bool, StorageError>;

    /// Sets orphan metadata on a block. The block and its transactions are retained.
    fn mark_orphaned(
        &self,
        hash: BlockHash,
        timestamp: u64,
        has_orphaned_parent: bool,
    ) -> Result<(), StorageError>;

    /// Orphans every canonical block at or above `height` in one transaction.
    ///
    /// The lowest block becomes the root of the reorg, all others are flagged as having an
    /// orphaned parent.
    fn orphan_canonical_from(
        &self,
        height: u64,
        timestamp: u64,
    ) -> Result<Vec<OrphanedBlock>, StorageError>;
}

/// Append-only ledger of finalization tier observations.
#[auto_impl(&, Arc)]
pub trait FinalizationStorage {
    /// Records that a block reached `status`.
    ///
    /// # Returns
    /// * `Ok(true)` if a new observation was written.
    /// * `Ok(false)` if the exact observation already existed.
    fn record_status(
        &self,
        hash: BlockHash,
        number: u64,
        status: FinalizationStatus,
        observed_at: u64,
    ) -> Result<bool, StorageError>;

    /// Returns the best tier recorded for a block.
    fn get_block_status(&self, hash: BlockHash)
    -> Result<Option<FinalizationStatus>, StorageError>;

    /// Returns every observation recorded for a block, lowest tier first.
    fn get_status_records(
        &self,
        hash: BlockHash,
    ) -> Result<Vec<FinalizationStatusRecord>, StorageError>;

    /// Records `status` for every canonical block below `number` that has not reached it yet.
    ///
    /// Runs as a single transaction.
    ///
    /// # Returns
    /// * `Ok(n)` with the number of backfilled blocks.
    fn ensure_ancestors_reach_status(
        &self,
        number: u64,
        status: FinalizationStatus,
        observed_at: u64,
    ) -> Result<u64, StorageError>;
}

/// Storage for tracked transactions and confirmed drops.
#[auto_impl(&, Arc)]
pub trait PendingTxStorage {
    /// Starts tracking a transaction. Returns `false` if it was already tracked.
    fn insert_pending_tx(&self, tx: &PendingTransaction) -> Result<bool, StorageError>;

    /// Gets a tracked transaction.
    fn get_pending_tx(&self, hash: TxHash) -> Result<Option<PendingTransaction>, StorageError>;

    /// Lists tracked transactions in any of `states`, oldest first.
    fn get_pending_txs_in_states(
        &self,
        states: &[PendingTxState],
    ) -> Result<Vec<PendingTransaction>, StorageError>;

    /// Lists tracked transactions in any of `states` that are included in a canonical block at
    /// or below `height`, oldest first.
    fn get_pending_txs_included_through(
        &self,
        height: u64,
        states: &[PendingTxState],
    ) -> Result<Vec<PendingTransaction>, StorageError>;

    /// Moves a transaction from `from` to `to`.
    ///
    /// # Returns
    /// * `Ok(true)` if the transaction was in `from` and has been updated.
    /// * `Ok(false)` if it is untracked or was not in `from`.
    fn advance_pending_tx(
        &self,
        hash: TxHash,
        from: PendingTxState,
        to: PendingTxState,
    ) -> Result<bool, StorageError>;

    /// Confirms drops in one transaction.
    ///
    /// Every transaction still tracked as `suspected_dropped` has its pending row removed and
    /// its drop record written. Others are left untouched.
    ///
    /// # Returns
    /// * `Ok(confirmed)` with the drops that were written.
    fn confirm_dropped(&self, dropped: &[DroppedTx]) -> Result<Vec<DroppedTx>, StorageError>;

    /// Gets the drop record of a transaction.
    fn get_dropped_tx(&self, hash: TxHash) -> Result<Option<DroppedTx>, StorageError>;
}

/// Persisted per-stream height cursors.
#[auto_impl(&, Arc)]
pub trait CursorStorage {
    /// Returns the next height to fetch for a stream, if one was stored.
    fn get_cursor(&self, key: &HeightCursorKey) -> Result<Option<u64>, StorageError>;

    /// Advances a cursor. A lower value than the stored one is ignored.
    fn set_cursor(&self, key: &HeightCursorKey, height: u64) -> Result<(), StorageError>;

    /// Writes a cursor unconditionally.
    fn set_override_cursor(&self, key: &HeightCursorKey, height: u64) -> Result<(), StorageError>;
}

/// Storage of the rollup validator set.
#[auto_impl(&, Arc)]
pub trait ValidatorStorage {
    /// Replaces the whole validator set of a rollup in one transaction.
    fn replace_validators(
        &self,
        rollup: Address,
        validators: &[ValidatorRecord],
    ) -> Result<(), StorageError>;

    /// Lists the validator set of a rollup.
    fn get_validators(&self, rollup: Address) -> Result<Vec<ValidatorRecord>, StorageError>;
}

/// Combined storage interface used by the ingestion core.
pub trait IndexerStorage:
    BlockStorageReader
    + BlockStorageWriter
    + FinalizationStorage
    + PendingTxStorage
    + CursorStorage
    + ValidatorStorage
    + Debug
    + Send
    + Sync
{
}

impl<T> IndexerStorage for T where
    T: BlockStorageReader
        + BlockStorageWriter
        + FinalizationStorage
        + PendingTxStorage
        + CursorStorage
        + ValidatorStorage
        + Debug
        + Send
        + Sync
{
}
