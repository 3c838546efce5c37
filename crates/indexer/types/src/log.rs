use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

/// A raw contract log returned by the L1 chain.
///
/// Decoding into typed events is left to the consumer of the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractLog {
    /// Emitting contract.
    pub address: Address,
    /// L1 block that contains the log.
    pub block_number: u64,
    /// L1 transaction that emitted the log.
    pub transaction_hash: B256,
    /// Index of the log within the block.
    pub log_index: u64,
    /// Indexed topics, the event signature first.
    pub topics: Vec<B256>,
    /// Non-indexed payload.
    pub data: Bytes,
}
