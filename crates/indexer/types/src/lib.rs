//! Core types shared across l2scan indexer components.
//!
//! This crate defines the fundamental data structures exchanged between the
//! chain adaptor, the storage layer and the ingestion core.

mod block;
pub use block::{BlockHash, L2Block, OrphanInfo, OrphanedBlock, Reorg};

mod finality;
pub use finality::{FinalizationStatus, FinalizationStatusRecord};

mod tx;
pub use tx::{DroppedTx, PendingTransaction, PendingTxState, TxHash};

mod cursor;
pub use cursor::HeightCursorKey;

mod log;
pub use log::ContractLog;

mod validator;
pub use validator::{ValidatorRecord, ValidatorStatus};

mod event;
pub use event::{
    DroppedTxsEvent, IndexerEvent, NewBlockEvent, ValidatorSetUpdatedEvent, DROPPED_TXS_EVENT,
    NEW_BLOCK_EVENT, VALIDATOR_SET_UPDATED_EVENT,
};
