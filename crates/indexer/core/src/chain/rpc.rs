use crate::{ChainError, ChainReader};
use alloy_eips::{BlockId, BlockNumberOrTag};
use alloy_primitives::{Address, B256, Bytes, TxKind, U64};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{Block, Filter, Log, TransactionInput, TransactionRequest};
use async_trait::async_trait;
use l2scan_types::{ContractLog, L2Block, TxHash};
use serde::Deserialize;
use tracing::{trace, warn};

/// Block as returned by `node_getBlock`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeBlock {
    hash: B256,
    number: u64,
    timestamp: u64,
    #[serde(default)]
    tx_hashes: Vec<TxHash>,
}

/// [`ChainReader`] over JSON-RPC: `node_*` methods on the L2 node, `eth_*` methods on L1.
#[derive(Debug, Clone)]
pub struct RpcChainReader {
    l1: RpcClient,
    l2_node: RpcClient,
}

impl RpcChainReader {
    /// Creates a new [`RpcChainReader`].
    pub const fn new(l1: RpcClient, l2_node: RpcClient) -> Self {
        Self { l1, l2_node }
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn get_block(&self, height: u64) -> Result<L2Block, ChainError> {
        let block: Option<NodeBlock> = self.l2_node.request("node_getBlock", (height,)).await?;
        let block = block.ok_or(ChainError::BlockNotFound(height))?;
        if block.number != height {
            return Err(ChainError::InvalidResponse(format!(
                "requested block {height}, node returned {}",
                block.number
            )));
        }
        Ok(L2Block::new(block.hash, block.number, block.timestamp, block.tx_hashes))
    }

    async fn get_latest_height(&self) -> Result<u64, ChainError> {
        Ok(self.l2_node.request_noparams("node_getBlockNumber").await?)
    }

    async fn get_latest_proven_height(&self) -> Result<u64, ChainError> {
        Ok(self.l2_node.request_noparams("node_getProvenBlockNumber").await?)
    }

    async fn get_l1_head(&self, finalized: bool) -> Result<u64, ChainError> {
        if !finalized {
            let number: U64 = self.l1.request_noparams("eth_blockNumber").await?;
            return Ok(number.to());
        }

        let block: Option<Block> = self
            .l1
            .request("eth_getBlockByNumber", (BlockNumberOrTag::Finalized, false))
            .await?;
        block
            .map(|block| block.header.number)
            .ok_or_else(|| ChainError::InvalidResponse("no finalized L1 block".to_string()))
    }

    async fn get_contract_events(
        &self,
        address: Address,
        event: B256,
        from: u64,
        to: u64,
    ) -> Result<Vec<ContractLog>, ChainError> {
        let filter =
            Filter::new().address(address).event_signature(event).from_block(from).to_block(to);
        let logs: Vec<Log> = self.l1.request("eth_getLogs", (filter,)).await?;
        trace!(target: "chain_reader", from, to, logs = logs.len(), "Fetched L1 logs");

        let logs = logs
            .into_iter()
            .filter_map(|log| {
                let Some(block_number) = log.block_number else {
                    warn!(
                        target: "chain_reader",
                        tx_hash = ?log.transaction_hash,
                        log_index = ?log.log_index,
                        "Skipping L1 log without block number"
                    );
                    return None;
                };
                Some(ContractLog {
                    address: log.address(),
                    block_number,
                    transaction_hash: log.transaction_hash.unwrap_or_default(),
                    log_index: log.log_index.unwrap_or_default(),
                    topics: log.topics().to_vec(),
                    data: log.data().data.clone(),
                })
            })
            .collect();
        Ok(logs)
    }

    async fn read_contract(
        &self,
        address: Address,
        calldata: Bytes,
        at_height: Option<u64>,
    ) -> Result<Bytes, ChainError> {
        let call = TransactionRequest {
            to: Some(TxKind::Call(address)),
            input: TransactionInput::new(calldata),
            ..Default::default()
        };
        let block = at_height.map_or(BlockId::latest(), BlockId::number);
        Ok(self.l1.request("eth_call", (call, block)).await?)
    }
}
