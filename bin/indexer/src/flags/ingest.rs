//! Poller, verifier and scheduling flags.

use clap::Args;
use l2scan_core::{DroppedTxConfig, PollerConfig};
use l2scan_service::PollIntervals;
use std::time::Duration;

/// Chunking, genesis heights, dropped transaction settings and job intervals.
#[derive(Args, Clone, Debug)]
pub struct IngestArgs {
    /// Maximum heights covered by one poll.
    #[arg(long = "poller.chunk-size", env = "DEFAULT_BLOCK_CHUNK_SIZE", default_value_t = 1_000)]
    pub block_chunk_size: u64,
    /// First L1 height scanned for rollup events.
    #[arg(long = "poller.genesis-l1-height", env = "GENESIS_L1_HEIGHT", default_value_t = 0)]
    pub genesis_l1_height: u64,
    /// First L2 height ingested.
    #[arg(long = "poller.genesis-l2-height", env = "GENESIS_L2_HEIGHT", default_value_t = 1)]
    pub genesis_l2_height: u64,
    /// Age a suspected drop must reach before it is verified, in milliseconds.
    #[arg(
        long = "dropped-tx.age-threshold-ms",
        env = "DROPPED_TX_AGE_THRESHOLD_MS",
        default_value_t = 300_000
    )]
    pub dropped_tx_age_threshold_ms: u64,
    /// Recent proven blocks rescanned per sweep.
    #[arg(
        long = "dropped-tx.block-lookback",
        env = "DROPPED_TX_BLOCK_LOOKBACK",
        default_value_t = 100
    )]
    pub dropped_tx_block_lookback: u64,
    /// Interval between L2 block polls, in milliseconds.
    #[arg(long = "interval.blocks-ms", env = "BLOCK_POLL_INTERVAL_MS", default_value_t = 2_000)]
    pub blocks_interval_ms: u64,
    /// Interval between L1 event polls, in milliseconds.
    #[arg(long = "interval.l1-events-ms", env = "L1_POLL_INTERVAL_MS", default_value_t = 12_000)]
    pub l1_events_interval_ms: u64,
    /// Interval between dropped transaction sweeps, in milliseconds.
    #[arg(
        long = "interval.dropped-tx-ms",
        env = "DROPPED_TX_SWEEP_INTERVAL_MS",
        default_value_t = 60_000
    )]
    pub dropped_tx_interval_ms: u64,
    /// Interval between validator set refreshes, in milliseconds.
    #[arg(
        long = "interval.validators-ms",
        env = "VALIDATOR_REFRESH_INTERVAL_MS",
        default_value_t = 300_000
    )]
    pub validators_interval_ms: u64,
    /// Messages buffered per lagging event bus subscriber.
    #[arg(long = "bus.capacity", env = "EVENT_BUS_CAPACITY", default_value_t = 1_024)]
    pub bus_capacity: usize,
}

impl IngestArgs {
    /// Returns the [`PollerConfig`] described by the flags.
    pub const fn poller(&self) -> PollerConfig {
        PollerConfig {
            block_chunk_size: self.block_chunk_size,
            genesis_l1_height: self.genesis_l1_height,
            genesis_l2_height: self.genesis_l2_height,
        }
    }

    /// Returns the [`DroppedTxConfig`] described by the flags.
    pub const fn dropped_tx(&self) -> DroppedTxConfig {
        DroppedTxConfig {
            age_threshold_ms: self.dropped_tx_age_threshold_ms,
            block_lookback: self.dropped_tx_block_lookback,
        }
    }

    /// Returns the [`PollIntervals`] described by the flags.
    pub const fn intervals(&self) -> PollIntervals {
        PollIntervals {
            blocks: Duration::from_millis(self.blocks_interval_ms),
            l1_events: Duration::from_millis(self.l1_events_interval_ms),
            dropped_tx_sweep: Duration::from_millis(self.dropped_tx_interval_ms),
            validators: Duration::from_millis(self.validators_interval_ms),
        }
    }
}
