use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{BlockHash, DroppedTx, FinalizationStatus, ValidatorRecord};

/// Topic of [`NewBlockEvent`].
pub const NEW_BLOCK_EVENT: &str = "NEW_BLOCK_EVENT";
/// Topic of [`DroppedTxsEvent`].
pub const DROPPED_TXS_EVENT: &str = "DROPPED_TXS_EVENT";
/// Topic of [`ValidatorSetUpdatedEvent`].
pub const VALIDATOR_SET_UPDATED_EVENT: &str = "VALIDATOR_SET_UPDATED_EVENT";

/// Emitted once for every processed L2 block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlockEvent {
    /// Block height.
    pub block_number: u64,
    /// Block hash.
    pub block_hash: BlockHash,
    /// Block timestamp in unix seconds.
    pub timestamp: u64,
    /// Number of transactions included in the block.
    pub tx_count: usize,
    /// Tier the block was processed at.
    pub finalization_status: FinalizationStatus,
}

/// Emitted at most once per dropped-transaction sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedTxsEvent {
    /// Transactions confirmed as dropped.
    pub txs: Vec<DroppedTx>,
}

/// Emitted once per successful validator set refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorSetUpdatedEvent {
    /// Rollup contract the set was read from.
    pub rollup_address: Address,
    /// The full validator set.
    pub validators: Vec<ValidatorRecord>,
}

/// A derived fact published to downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexerEvent {
    /// See [`NewBlockEvent`].
    NewBlock(NewBlockEvent),
    /// See [`DroppedTxsEvent`].
    DroppedTxs(DroppedTxsEvent),
    /// See [`ValidatorSetUpdatedEvent`].
    ValidatorSetUpdated(ValidatorSetUpdatedEvent),
}

impl IndexerEvent {
    /// Bus topic the event is published on.
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::NewBlock(_) => NEW_BLOCK_EVENT,
            Self::DroppedTxs(_) => DROPPED_TXS_EVENT,
            Self::ValidatorSetUpdated(_) => VALIDATOR_SET_UPDATED_EVENT,
        }
    }
}
