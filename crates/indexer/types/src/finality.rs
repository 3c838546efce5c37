use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use strum::{Display, EnumIter, FromRepr};

use crate::BlockHash;

/// Finalization tier of an L2 block.
///
/// Tiers are totally ordered: a block only ever climbs, and the current tier of a block is
/// the maximum of all tiers recorded for it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize_repr,
    Deserialize_repr,
    Display,
    EnumIter,
    FromRepr,
)]
#[repr(u8)]
#[strum(serialize_all = "snake_case")]
pub enum FinalizationStatus {
    /// Block was served by the L2 node but is not known on L1 yet.
    L2NodeSeenProposed = 0,
    /// Block proposal was observed in the L1 mempool.
    L1SeenProposed = 1,
    /// Block proposal was included in an L1 block.
    L1MinedProposed = 2,
    /// The L2 node reports the block as proven.
    L2NodeSeenProven = 3,
    /// Proof for the block was observed in the L1 mempool.
    L1SeenProven = 4,
    /// Proof for the block was included in an L1 block.
    L1MinedProven = 5,
    /// Proof for the block is part of a finalized L1 block.
    Finalized = 6,
}

impl FinalizationStatus {
    /// Returns true if the tier implies that a proof for the block exists.
    pub const fn is_proven(self) -> bool {
        self as u8 >= Self::L2NodeSeenProven as u8
    }

    /// Returns the numeric representation used in storage and payloads.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A single observation of a block reaching a finalization tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizationStatusRecord {
    /// Hash of the L2 block.
    pub l2_block_hash: BlockHash,
    /// Height of the L2 block.
    pub l2_block_number: u64,
    /// Tier reached.
    pub status: FinalizationStatus,
    /// Time (unix ms) at which the tier was observed.
    pub observed_at: u64,
}
