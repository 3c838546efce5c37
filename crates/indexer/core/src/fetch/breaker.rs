use crate::{Clock, Metrics};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// Consecutive-failure circuit breaker of one ingestion stream.
///
/// ```text
///            failures >= threshold
///  closed ─────────────────────────► open
///    ▲                                 │ timeout elapsed
///    │ success                         ▼
///    └──────────────────────────── half-open ──► open (on failure)
/// ```
///
/// State lives in memory only and resets on restart.
#[derive(Debug)]
pub struct CircuitBreaker {
    stream: String,
    threshold: u32,
    timeout: Duration,
    consecutive_failures: u32,
    open_until: Option<u64>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    pub fn new(
        stream: impl Into<String>,
        threshold: u32,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            stream: stream.into(),
            threshold: threshold.max(1),
            timeout,
            consecutive_failures: 0,
            open_until: None,
            clock,
        }
    }

    /// Resets the failure counter and closes the breaker.
    pub fn record_success(&mut self) {
        if self.open_until.is_some() {
            info!(target: "circuit_breaker", stream = %self.stream, "Circuit breaker closed");
        }
        self.consecutive_failures = 0;
        self.open_until = None;
    }

    /// Counts an exhausted batch. Opens the breaker once the threshold is reached.
    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures < self.threshold {
            return;
        }

        let open_until = self.clock.now_ms().saturating_add(self.timeout.as_millis() as u64);
        self.open_until = Some(open_until);
        metrics::counter!(Metrics::CIRCUIT_BREAKER_OPENED_TOTAL, "stream" => self.stream.clone())
            .increment(1);
        warn!(
            target: "circuit_breaker",
            stream = %self.stream,
            consecutive_failures = self.consecutive_failures,
            open_until,
            "Circuit breaker opened"
        );
    }

    /// Returns true while requests must be rejected.
    ///
    /// Once the timeout elapsed the breaker is half-open and lets the next request through.
    pub fn is_open(&self) -> bool {
        self.open_until.is_some_and(|until| self.clock.now_ms() < until)
    }

    /// Time (unix ms) until which the breaker stays open, if it opened since the last success.
    pub const fn open_until(&self) -> Option<u64> {
        self.open_until
    }

    /// Number of consecutive failures recorded.
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
