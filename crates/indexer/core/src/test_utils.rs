//! In-memory doubles of the chain, the clock and the message bus.

use crate::{BusError, ChainError, ChainReader, Clock, IRollup, MessageBus};
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::{SolInterface, SolValue};
use async_trait::async_trait;
use l2scan_types::{ContractLog, L2Block};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

/// A [`Clock`] that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self { now_ms: Arc::new(AtomicU64::new(now_ms)) }
    }

    /// Moves the clock forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Sets the clock to `now_ms`.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct FakeChainState {
    blocks: BTreeMap<u64, L2Block>,
    latest: u64,
    proven: u64,
    l1_latest: u64,
    l1_finalized: u64,
    logs: Vec<ContractLog>,
    failing_heights: HashSet<u64>,
    failing_views: HashSet<Address>,
    fail_proven_height: bool,
    requested_heights: Vec<u64>,
    attesters: Vec<(Address, IRollup::AttesterView)>,
}

/// A scripted [`ChainReader`].
#[derive(Debug, Default)]
pub struct FakeChain {
    state: Mutex<FakeChainState>,
}

impl FakeChain {
    /// Serves `block` at its height, replacing any previous block there.
    pub fn push_block(&self, block: L2Block) {
        let mut state = self.state.lock();
        state.latest = state.latest.max(block.height);
        state.blocks.insert(block.height, block);
    }

    /// Sets the latest L2 height.
    pub fn set_latest_height(&self, height: u64) {
        self.state.lock().latest = height;
    }

    /// Sets the latest proven L2 height.
    pub fn set_proven_height(&self, height: u64) {
        self.state.lock().proven = height;
    }

    /// Makes `get_latest_proven_height` fail while `fail` is set.
    pub fn fail_proven_height(&self, fail: bool) {
        self.state.lock().fail_proven_height = fail;
    }

    /// Sets the latest and finalized L1 heights.
    pub fn set_l1_heads(&self, latest: u64, finalized: u64) {
        let mut state = self.state.lock();
        state.l1_latest = latest;
        state.l1_finalized = finalized;
    }

    /// Adds a log served by `get_contract_events`.
    pub fn push_log(&self, log: ContractLog) {
        self.state.lock().logs.push(log);
    }

    /// Makes every fetch of the block at `height` fail.
    pub fn fail_height(&self, height: u64) {
        self.state.lock().failing_heights.insert(height);
    }

    /// Heights passed to `get_block`, in call order.
    pub fn requested_heights(&self) -> Vec<u64> {
        self.state.lock().requested_heights.clone()
    }

    /// Sets the attester list served by the rollup contract.
    pub fn set_attesters(&self, attesters: Vec<(Address, IRollup::AttesterView)>) {
        self.state.lock().attesters = attesters;
    }

    /// Makes every `getAttesterView` call for `attester` fail.
    pub fn fail_attester_view(&self, attester: Address) {
        self.state.lock().failing_views.insert(attester);
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn get_block(&self, height: u64) -> Result<L2Block, ChainError> {
        let mut state = self.state.lock();
        state.requested_heights.push(height);
        if state.failing_heights.contains(&height) {
            return Err(ChainError::InvalidResponse(format!("block {height} unavailable")));
        }
        state.blocks.get(&height).cloned().ok_or(ChainError::BlockNotFound(height))
    }

    async fn get_latest_height(&self) -> Result<u64, ChainError> {
        Ok(self.state.lock().latest)
    }

    async fn get_latest_proven_height(&self) -> Result<u64, ChainError> {
        let state = self.state.lock();
        if state.fail_proven_height {
            return Err(ChainError::InvalidResponse("proven height unavailable".to_string()));
        }
        Ok(state.proven)
    }

    async fn get_l1_head(&self, finalized: bool) -> Result<u64, ChainError> {
        let state = self.state.lock();
        Ok(if finalized { state.l1_finalized } else { state.l1_latest })
    }

    async fn get_contract_events(
        &self,
        address: Address,
        event: B256,
        from: u64,
        to: u64,
    ) -> Result<Vec<ContractLog>, ChainError> {
        Ok(self
            .state
            .lock()
            .logs
            .iter()
            .filter(|log| {
                log.address == address &&
                    log.topics.first() == Some(&event) &&
                    (from..=to).contains(&log.block_number)
            })
            .cloned()
            .collect())
    }

    async fn read_contract(
        &self,
        _address: Address,
        calldata: Bytes,
        _at_height: Option<u64>,
    ) -> Result<Bytes, ChainError> {
        let state = self.state.lock();
        let encoded = match IRollup::IRollupCalls::abi_decode(&calldata)? {
            IRollup::IRollupCalls::getActiveAttesterCount(_) => {
                U256::from(state.attesters.len()).abi_encode()
            }
            IRollup::IRollupCalls::getAttesterAtIndex(call) => {
                let (attester, _) = usize::try_from(call.index)
                    .ok()
                    .and_then(|index| state.attesters.get(index))
                    .ok_or_else(|| ChainError::InvalidResponse("index out of range".to_string()))?;
                attester.abi_encode()
            }
            IRollup::IRollupCalls::getAttesterView(call) => {
                if state.failing_views.contains(&call.attester) {
                    return Err(ChainError::InvalidResponse("view unavailable".to_string()));
                }
                let (_, view) = state
                    .attesters
                    .iter()
                    .find(|(attester, _)| *attester == call.attester)
                    .ok_or_else(|| ChainError::InvalidResponse("unknown attester".to_string()))?;
                view.abi_encode()
            }
        };
        Ok(encoded.into())
    }
}

/// A [`MessageBus`] that records every published message.
#[derive(Debug, Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, serde_json::Value)>>,
    failing: AtomicBool,
}

impl RecordingBus {
    /// Every message published so far, with its decoded payload.
    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().clone()
    }

    /// Payloads published on `topic`.
    pub fn published_on(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published
            .lock()
            .iter()
            .filter(|(published, _)| published == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Makes every publish fail while `fail` is set.
    pub fn fail_publishes(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BusError::Rejected("recording bus set to fail".to_string()));
        }
        let payload = serde_json::from_str(&payload)
            .map_err(|err| BusError::Rejected(err.to_string()))?;
        self.published.lock().push((topic.to_string(), payload));
        Ok(())
    }
}
