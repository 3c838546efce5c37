//! Retry and circuit breaker flags.

use clap::Args;
use l2scan_core::FetchConfig;
use std::time::Duration;

/// Retry, batching and circuit breaker settings shared by every stream.
#[derive(Args, Clone, Debug)]
pub struct FetchArgs {
    /// Sub-requests per batch.
    #[arg(long = "fetch.batch-size", env = "BATCH_SIZE", default_value_t = 10)]
    pub batch_size: usize,
    /// Pause between two batches, in milliseconds.
    #[arg(long = "fetch.batch-delay-ms", env = "BATCH_DELAY_MS", default_value_t = 100)]
    pub batch_delay_ms: u64,
    /// Attempts per batch or call.
    #[arg(long = "fetch.max-retries", env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,
    /// Backoff after the first failed attempt, in milliseconds. Doubles on each retry.
    #[arg(long = "fetch.initial-backoff-ms", env = "INITIAL_BACKOFF_MS", default_value_t = 1_000)]
    pub initial_backoff_ms: u64,
    /// Consecutive exhausted batches that open a stream's circuit breaker.
    #[arg(
        long = "fetch.circuit-breaker-threshold",
        env = "CIRCUIT_BREAKER_THRESHOLD",
        default_value_t = 5
    )]
    pub circuit_breaker_threshold: u32,
    /// How long an open breaker rejects requests, in milliseconds.
    #[arg(
        long = "fetch.circuit-breaker-timeout-ms",
        env = "CIRCUIT_BREAKER_TIMEOUT_MS",
        default_value_t = 60_000
    )]
    pub circuit_breaker_timeout_ms: u64,
}

impl FetchArgs {
    /// Returns the [`FetchConfig`] described by the flags.
    pub const fn config(&self) -> FetchConfig {
        FetchConfig {
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            circuit_breaker_threshold: self.circuit_breaker_threshold,
            circuit_breaker_timeout: Duration::from_millis(self.circuit_breaker_timeout_ms),
        }
    }
}
