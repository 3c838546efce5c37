use alloy_primitives::Address;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identity of one ingestion stream.
///
/// Each stream owns exactly one persisted height cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[display("{source_contract}@{source_address}:{event_name}(finalized={is_finalized})")]
pub struct HeightCursorKey {
    /// Logical name of the source contract, e.g. `rollup`.
    pub source_contract: String,
    /// Address of the source contract.
    pub source_address: Address,
    /// Name of the polled event.
    pub event_name: String,
    /// Whether the stream follows the finalized head.
    pub is_finalized: bool,
}

impl HeightCursorKey {
    /// Creates a new [`HeightCursorKey`].
    pub fn new(
        source_contract: impl Into<String>,
        source_address: Address,
        event_name: impl Into<String>,
        is_finalized: bool,
    ) -> Self {
        Self {
            source_contract: source_contract.into(),
            source_address,
            event_name: event_name.into(),
            is_finalized,
        }
    }
}
