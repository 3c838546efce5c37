//! Upstream chain access.

mod abi;
pub use abi::IRollup;

mod rpc;
pub use rpc::RpcChainReader;

use crate::ChainError;
use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use l2scan_types::{ContractLog, L2Block};
use std::fmt::Debug;

/// Read access to the L2 node and the L1 chain.
#[async_trait]
pub trait ChainReader: Debug + Send + Sync {
    /// Fetches the L2 block at `height` with its transaction hashes.
    ///
    /// # Returns
    /// * `Err(ChainError::BlockNotFound)` if the node does not know the height.
    async fn get_block(&self, height: u64) -> Result<L2Block, ChainError>;

    /// Latest L2 height known to the node.
    async fn get_latest_height(&self) -> Result<u64, ChainError>;

    /// Latest L2 height the node considers proven.
    async fn get_latest_proven_height(&self) -> Result<u64, ChainError>;

    /// Latest (or finalized) L1 height.
    async fn get_l1_head(&self, finalized: bool) -> Result<u64, ChainError>;

    /// Logs emitted by `address` with topic0 `event` in the inclusive L1 range `[from, to]`.
    async fn get_contract_events(
        &self,
        address: Address,
        event: B256,
        from: u64,
        to: u64,
    ) -> Result<Vec<ContractLog>, ChainError>;

    /// Executes a read-only call against an L1 contract, at `at_height` or the latest block.
    async fn read_contract(
        &self,
        address: Address,
        calldata: Bytes,
        at_height: Option<u64>,
    ) -> Result<Bytes, ChainError>;
}
