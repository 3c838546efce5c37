//! Tunables of the ingestion core.

use std::time::Duration;

/// Retry, batching and circuit breaker settings of a [`FetchPipeline`](crate::FetchPipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Number of sub-requests per batch.
    pub batch_size: usize,
    /// Pause between two consecutive batches.
    pub batch_delay: Duration,
    /// Attempts per batch or single call.
    pub max_retries: u32,
    /// Wait after the first failed attempt. Doubles after each further failure.
    pub initial_backoff: Duration,
    /// Consecutive exhausted batches that open the breaker.
    pub circuit_breaker_threshold: u32,
    /// How long an open breaker rejects requests.
    pub circuit_breaker_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_millis(100),
            max_retries: 3,
            initial_backoff: Duration::from_millis(1_000),
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout: Duration::from_millis(60_000),
        }
    }
}

impl FetchConfig {
    /// Wait after failed attempt number `attempt` (1-based): `initial_backoff * 2^(attempt-1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }

    /// Number of attempts actually made. At least one.
    pub const fn attempts(&self) -> u32 {
        if self.max_retries == 0 { 1 } else { self.max_retries }
    }
}

/// Settings of the [`DroppedTxVerifier`](crate::DroppedTxVerifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroppedTxConfig {
    /// Minimum age (ms) of a suspected drop before it is verified.
    pub age_threshold_ms: u64,
    /// Number of recent proven blocks rescanned per sweep.
    pub block_lookback: u64,
}

impl Default for DroppedTxConfig {
    fn default() -> Self {
        Self { age_threshold_ms: 300_000, block_lookback: 100 }
    }
}

/// Settings shared by cursor-driven pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Maximum number of heights covered by one poll.
    pub block_chunk_size: u64,
    /// First L1 height scanned by a fresh event stream.
    pub genesis_l1_height: u64,
    /// First L2 height ingested by a fresh block stream.
    pub genesis_l2_height: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { block_chunk_size: 1_000, genesis_l1_height: 0, genesis_l2_height: 1 }
    }
}
