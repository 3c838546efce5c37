use alloy_primitives::Address;
use l2scan_core::{DroppedTxConfig, FetchConfig, PollerConfig};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// How often each job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    /// L2 block ingestion.
    pub blocks: Duration,
    /// L1 rollup event streams.
    pub l1_events: Duration,
    /// Dropped transaction sweeps.
    pub dropped_tx_sweep: Duration,
    /// Validator set refreshes.
    pub validators: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            blocks: Duration::from_secs(2),
            l1_events: Duration::from_secs(12),
            dropped_tx_sweep: Duration::from_secs(60),
            validators: Duration::from_secs(300),
        }
    }
}

/// Full configuration of the [`IndexerService`](crate::IndexerService).
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// L1 execution client JSON-RPC endpoint.
    pub l1_rpc: Url,
    /// L2 node JSON-RPC endpoint.
    pub l2_node_rpc: Url,
    /// Address of the rollup contract on L1.
    pub rollup_address: Address,
    /// SQLite database file. An in-memory database is used when unset.
    pub database_path: Option<PathBuf>,
    /// Retry and breaker settings, applied to every stream.
    pub fetch: FetchConfig,
    /// Dropped transaction verifier settings.
    pub dropped_tx: DroppedTxConfig,
    /// Poller chunking and genesis heights.
    pub poller: PollerConfig,
    /// Job intervals.
    pub intervals: PollIntervals,
    /// Messages buffered per lagging bus subscriber.
    pub bus_capacity: usize,
}
