use alloy_primitives::B256;
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};

use crate::TxHash;

/// Hash identifying an L2 block.
pub type BlockHash = B256;

/// An L2 block as observed by the indexer.
///
/// Blocks are created once and never deleted. When a block is superseded by a reorg
/// its [`OrphanInfo`] is set instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2Block {
    /// Block hash, the identity of the block.
    pub hash: BlockHash,
    /// Block height.
    pub height: u64,
    /// Block timestamp in unix seconds.
    pub timestamp: u64,
    /// Hashes of the transactions included in the block.
    pub tx_hashes: Vec<TxHash>,
    /// Orphan metadata, set once the block is superseded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orphan: Option<OrphanInfo>,
}

impl L2Block {
    /// Creates a canonical (non-orphaned) block.
    pub const fn new(hash: BlockHash, height: u64, timestamp: u64, tx_hashes: Vec<TxHash>) -> Self {
        Self { hash, height, timestamp, tx_hashes, orphan: None }
    }

    /// Returns true if the block has been orphaned by a reorg.
    pub const fn is_orphaned(&self) -> bool {
        self.orphan.is_some()
    }
}

/// Orphan metadata attached to a superseded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct OrphanInfo {
    /// Time (unix ms) at which the block was orphaned. Shared by all blocks of one reorg.
    pub timestamp: u64,
    /// Whether the parent of this block was orphaned in the same reorg.
    pub has_orphaned_parent: bool,
}

/// Lightweight view of an orphaned block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedBlock {
    /// Hash of the orphaned block.
    pub hash: BlockHash,
    /// Height of the orphaned block.
    pub height: u64,
    /// Orphan metadata.
    pub orphan: OrphanInfo,
}

/// Summary of one chain reorganization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[display("reorg(root: {root_hash}, height: {root_height}, depth: {orphaned_count})")]
pub struct Reorg {
    /// The lowest orphaned block of the reorg.
    pub root_hash: BlockHash,
    /// Height of the root block.
    pub root_height: u64,
    /// Time (unix ms) of the reorg.
    pub timestamp: u64,
    /// Number of blocks orphaned together, root inclusive.
    pub orphaned_count: u64,
}
