//! Main database access structure and transaction contexts.

use crate::{
    StorageError,
    providers::{
        BlockProvider, CursorProvider, FinalizationProvider, PendingTxProvider, ValidatorProvider,
    },
    schema::run_migrations,
    traits::{
        BlockStorageReader, BlockStorageWriter, CursorStorage, FinalizationStorage,
        PendingTxStorage, ValidatorStorage,
    },
};
use alloy_primitives::Address;
use l2scan_types::{
    BlockHash, DroppedTx, FinalizationStatus, FinalizationStatusRecord, HeightCursorKey, L2Block,
    OrphanedBlock, PendingTransaction, PendingTxState, Reorg, TxHash, ValidatorRecord,
};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::{path::Path, time::Duration};
use tracing::info;

/// How long a writer waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Manages the SQLite database of the indexer.
/// Provides transactional access to data via providers.
#[derive(Debug)]
pub struct IndexerDb {
    conn: Mutex<Connection>,
}

impl IndexerDb {
    /// Creates or opens a database at the given path and applies pending migrations.
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self::init(conn)?;
        info!(target: "indexer_storage", path = %path.display(), "Opened indexer database");
        Ok(db)
    }

    /// Creates a private in-memory database.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        run_migrations(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Runs `f` against the connection without opening a transaction.
    fn view<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Runs `f` inside a transaction that commits only if `f` succeeds.
    fn update<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

impl BlockStorageReader for IndexerDb {
    fn get_block(&self, hash: BlockHash) -> Result<L2Block, StorageError> {
        self.view(|conn| BlockProvider::new(conn).get_block(hash))
    }

    fn get_canonical_block_at(&self, height: u64) -> Result<Option<L2Block>, StorageError> {
        self.view(|conn| BlockProvider::new(conn).get_canonical_block_at(height))
    }

    fn get_latest_block(&self, include_orphaned: bool) -> Result<Option<L2Block>, StorageError> {
        self.view(|conn| BlockProvider::new(conn).get_latest_block(include_orphaned))
    }

    fn get_orphaned_blocks(&self) -> Result<Vec<OrphanedBlock>, StorageError> {
        self.view(|conn| BlockProvider::new(conn).get_orphaned_blocks())
    }

    fn get_reorgs(&self) -> Result<Vec<Reorg>, StorageError> {
        self.view(|conn| BlockProvider::new(conn).get_reorgs())
    }
}

impl BlockStorageWriter for IndexerDb {
    fn store_block(&self, block: &L2Block) -> Result<bool, StorageError> {
        self.update(|tx| BlockProvider::new(tx).store_block(block))
    }

    fn mark_orphaned(
        &self,
        hash: BlockHash,
        timestamp: u64,
        has_orphaned_parent: bool,
    ) -> Result<(), StorageError> {
        self.update(|tx| BlockProvider::new(tx).mark_orphaned(hash, timestamp, has_orphaned_parent))
    }

    fn orphan_canonical_from(
        &self,
        height: u64,
        timestamp: u64,
    ) -> Result<Vec<OrphanedBlock>, StorageError> {
        self.update(|tx| BlockProvider::new(tx).orphan_canonical_from(height, timestamp))
    }
}

impl FinalizationStorage for IndexerDb {
    fn record_status(
        &self,
        hash: BlockHash,
        number: u64,
        status: FinalizationStatus,
        observed_at: u64,
    ) -> Result<bool, StorageError> {
        self.update(|tx| {
            FinalizationProvider::new(tx).record_status(hash, number, status, observed_at)
        })
    }

    fn get_block_status(
        &self,
        hash: BlockHash,
    ) -> Result<Option<FinalizationStatus>, StorageError> {
        self.view(|conn| FinalizationProvider::new(conn).get_block_status(hash))
    }

    fn get_status_records(
        &self,
        hash: BlockHash,
    ) -> Result<Vec<FinalizationStatusRecord>, StorageError> {
        self.view(|conn| FinalizationProvider::new(conn).get_status_records(hash))
    }

    fn ensure_ancestors_reach_status(
        &self,
        number: u64,
        status: FinalizationStatus,
        observed_at: u64,
    ) -> Result<u64, StorageError> {
        self.update(|tx| {
            FinalizationProvider::new(tx).ensure_ancestors_reach_status(number, status, observed_at)
        })
    }
}

impl PendingTxStorage for IndexerDb {
    fn insert_pending_tx(&self, tx: &PendingTransaction) -> Result<bool, StorageError> {
        self.update(|ctx| PendingTxProvider::new(ctx).insert_pending_tx(tx))
    }

    fn get_pending_tx(&self, hash: TxHash) -> Result<Option<PendingTransaction>, StorageError> {
        self.view(|conn| PendingTxProvider::new(conn).get_pending_tx(hash))
    }

    fn get_pending_txs_in_states(
        &self,
        states: &[PendingTxState],
    ) -> Result<Vec<PendingTransaction>, StorageError> {
        self.view(|conn| PendingTxProvider::new(conn).get_pending_txs_in_states(states))
    }

    fn get_pending_txs_included_through(
        &self,
        height: u64,
        states: &[PendingTxState],
    ) -> Result<Vec<PendingTransaction>, StorageError> {
        self.view(|conn| {
            PendingTxProvider::new(conn).get_pending_txs_included_through(height, states)
        })
    }

    fn advance_pending_tx(
        &self,
        hash: TxHash,
        from: PendingTxState,
        to: PendingTxState,
    ) -> Result<bool, StorageError> {
        self.update(|tx| PendingTxProvider::new(tx).advance_pending_tx(hash, from, to))
    }

    fn confirm_dropped(&self, dropped: &[DroppedTx]) -> Result<Vec<DroppedTx>, StorageError> {
        self.update(|tx| PendingTxProvider::new(tx).confirm_dropped(dropped))
    }

    fn get_dropped_tx(&self, hash: TxHash) -> Result<Option<DroppedTx>, StorageError> {
        self.view(|conn| PendingTxProvider::new(conn).get_dropped_tx(hash))
    }
}

impl CursorStorage for IndexerDb {
    fn get_cursor(&self, key: &HeightCursorKey) -> Result<Option<u64>, StorageError> {
        self.view(|conn| CursorProvider::new(conn).get_cursor(key))
    }

    fn set_cursor(&self, key: &HeightCursorKey, height: u64) -> Result<(), StorageError> {
        self.update(|tx| CursorProvider::new(tx).set_cursor(key, height))
    }

    fn set_override_cursor(&self, key: &HeightCursorKey, height: u64) -> Result<(), StorageError> {
        self.update(|tx| CursorProvider::new(tx).set_override_cursor(key, height))
    }
}

impl ValidatorStorage for IndexerDb {
    fn replace_validators(
        &self,
        rollup: Address,
        validators: &[ValidatorRecord],
    ) -> Result<(), StorageError> {
        self.update(|tx| ValidatorProvider::new(tx).replace_validators(rollup, validators))
    }

    fn get_validators(&self, rollup: Address) -> Result<Vec<ValidatorRecord>, StorageError> {
        self.view(|conn| ValidatorProvider::new(conn).get_validators(rollup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_reopen_db() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db_path = tmp_dir.path().join("indexer.sqlite");
        let block = L2Block::new(B256::repeat_byte(1), 1, 100, vec![B256::repeat_byte(2)]);

        {
            let db = IndexerDb::new(&db_path).expect("create db");
            assert!(db.store_block(&block).unwrap());
        }

        let db = IndexerDb::new(&db_path).expect("reopen db");
        assert_eq!(db.get_block(block.hash).unwrap(), block);
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let db = IndexerDb::in_memory().unwrap();
        db.store_block(&L2Block::new(B256::repeat_byte(1), 1, 1, vec![])).unwrap();

        let result: Result<(), StorageError> = db.update(|tx| {
            BlockProvider::new(tx).mark_orphaned(B256::repeat_byte(1), 10, false)?;
            BlockProvider::new(tx).mark_orphaned(B256::repeat_byte(9), 10, false)
        });
        assert!(matches!(result, Err(StorageError::EntryNotFound(_))));
        assert!(!db.get_block(B256::repeat_byte(1)).unwrap().is_orphaned());
    }

    #[test]
    fn test_tx_rows_require_stored_block() {
        let db = IndexerDb::in_memory().unwrap();
        let result = db.update(|tx| {
            tx.execute(
                "INSERT INTO l2_block_tx (block_hash, tx_index, tx_hash) VALUES (x'00', 0, x'01')",
                [],
            )?;
            Ok(())
        });
        assert!(matches!(result, Err(StorageError::Database(_))));
    }

    #[test]
    fn test_failed_drop_confirmation_keeps_suspect() {
        let db = IndexerDb::in_memory().unwrap();
        let hash = B256::repeat_byte(4);
        let suspect = PendingTransaction::new(hash, 1, PendingTxState::SuspectedDropped);
        db.insert_pending_tx(&suspect).unwrap();
        assert_eq!(db.confirm_dropped(&[DroppedTx::new(hash, 1, 10)]).unwrap().len(), 1);

        // tracked again while a drop record already exists: the second insert conflicts
        db.insert_pending_tx(&suspect).unwrap();
        assert!(db.confirm_dropped(&[DroppedTx::new(hash, 1, 20)]).is_err());

        assert_eq!(db.get_pending_tx(hash).unwrap(), Some(suspect));
        assert_eq!(db.get_dropped_tx(hash).unwrap(), Some(DroppedTx::new(hash, 1, 10)));
    }

    #[test]
    fn test_storage_traits_through_arc() {
        use std::sync::Arc;

        fn latest(storage: impl BlockStorageReader) -> Option<u64> {
            storage.get_latest_block(false).unwrap().map(|b| b.height)
        }

        let db = Arc::new(IndexerDb::in_memory().unwrap());
        db.store_block(&L2Block::new(B256::repeat_byte(3), 7, 1, vec![])).unwrap();
        assert_eq!(latest(db.clone()), Some(7));
    }
}
