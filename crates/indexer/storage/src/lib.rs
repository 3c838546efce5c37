//! Persistent storage for the l2scan indexer.
//!
//! The database is a single SQLite file holding L2 blocks and their
//! transactions, the append-only finalization ledger, tracked and dropped
//! transactions, per-stream height cursors and the rollup validator set.
//!
//! Every multi-row write runs inside one transaction. Readers therefore never
//! observe a half-applied reorg, backfill or drop confirmation.

mod error;
pub use error::StorageError;

mod db;
pub use db::IndexerDb;

mod traits;
pub use traits::{
    BlockStorageReader, BlockStorageWriter, CursorStorage, FinalizationStorage, IndexerStorage,
    PendingTxStorage, ValidatorStorage,
};

mod providers;
mod schema;
mod sql;
