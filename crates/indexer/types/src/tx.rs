use alloy_primitives::B256;
use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::FinalizationStatus;

/// Hash identifying an L2 transaction.
pub type TxHash = B256;

/// Lifecycle state of a tracked transaction.
///
/// ```text
/// pending ──► proposed ──► proven
///    │           │           ▲
///    └──► suspected_dropped ─┤
///                 │          │
///                 └──► dropped
/// ```
///
/// `proven` and `dropped` are terminal. A suspected drop can still be observed in a block
/// and move to `proposed` or `proven`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PendingTxState {
    /// Submitted but not observed in any block.
    Pending,
    /// Included in a proposed block.
    Proposed,
    /// Not observed in any block after a grace period.
    SuspectedDropped,
    /// Included in a proven block.
    Proven,
    /// Confirmed lost.
    Dropped,
}

impl PendingTxState {
    /// Returns the persisted string form of the state.
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Returns true if no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Proven | Self::Dropped)
    }

    /// Returns true if moving from `self` to `next` is a forward move in the lifecycle.
    pub const fn can_advance_to(self, next: Self) -> bool {
        use PendingTxState::*;
        matches!(
            (self, next),
            (Pending, Proposed | Proven | SuspectedDropped) |
                (Proposed, Proven | SuspectedDropped) |
                (SuspectedDropped, Proposed | Proven | Dropped)
        )
    }

    /// The state implied for a transaction included in a block at the given tier.
    pub const fn from_inclusion(status: FinalizationStatus) -> Self {
        if status.is_proven() { Self::Proven } else { Self::Proposed }
    }
}

/// A transaction tracked from submission until it is proven or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Time (unix ms) at which the transaction was first observed.
    pub birth_timestamp: u64,
    /// Current lifecycle state.
    pub state: PendingTxState,
}

impl PendingTransaction {
    /// Age of the transaction in milliseconds at `now_ms`.
    pub const fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.birth_timestamp)
    }
}

/// Record of a transaction confirmed as dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct DroppedTx {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Time (unix ms) at which the transaction was first seen as pending.
    pub created_as_pending_at: u64,
    /// Time (unix ms) at which the drop was confirmed.
    pub dropped_at: u64,
}
