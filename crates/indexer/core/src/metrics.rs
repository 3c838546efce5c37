/// Metric names and helpers of the ingestion core.
#[derive(Debug, Clone)]
pub struct Metrics;

impl Metrics {
    pub(crate) const FETCH_RETRIES_TOTAL: &'static str = "l2scan_fetch_retries_total";
    pub(crate) const FETCH_EXHAUSTED_TOTAL: &'static str = "l2scan_fetch_exhausted_total";
    pub(crate) const FETCH_SKIPPED_BATCHES_TOTAL: &'static str =
        "l2scan_fetch_skipped_batches_total";
    pub(crate) const CIRCUIT_BREAKER_OPENED_TOTAL: &'static str =
        "l2scan_circuit_breaker_opened_total";
    pub(crate) const CURSOR_HEIGHT: &'static str = "l2scan_cursor_height";
    pub(crate) const BACKFILLED_STATUSES_TOTAL: &'static str = "l2scan_backfilled_statuses_total";
    pub(crate) const REORGS_TOTAL: &'static str = "l2scan_reorgs_total";
    pub(crate) const ORPHANED_BLOCKS_TOTAL: &'static str = "l2scan_orphaned_blocks_total";
    pub(crate) const DROPPED_TXS_TOTAL: &'static str = "l2scan_dropped_txs_total";
    pub(crate) const RECOVERED_TXS_TOTAL: &'static str = "l2scan_recovered_txs_total";
    pub(crate) const SWEEP_DURATION_SECONDS: &'static str = "l2scan_dropped_tx_sweep_seconds";
    pub(crate) const EVENTS_PUBLISHED_TOTAL: &'static str = "l2scan_events_published_total";
    pub(crate) const EVENTS_FAILED_TOTAL: &'static str = "l2scan_events_failed_total";

    /// Describes every core metric and sets counters to zero so they are exported from the
    /// start.
    pub fn init() {
        Self::describe();
        Self::zero();
    }

    fn describe() {
        metrics::describe_counter!(
            Self::FETCH_RETRIES_TOTAL,
            metrics::Unit::Count,
            "Failed fetch attempts that were retried",
        );
        metrics::describe_counter!(
            Self::FETCH_EXHAUSTED_TOTAL,
            metrics::Unit::Count,
            "Batches or calls that failed every attempt",
        );
        metrics::describe_counter!(
            Self::FETCH_SKIPPED_BATCHES_TOTAL,
            metrics::Unit::Count,
            "Batches skipped because the circuit breaker was open",
        );
        metrics::describe_counter!(
            Self::CIRCUIT_BREAKER_OPENED_TOTAL,
            metrics::Unit::Count,
            "Number of times a circuit breaker opened",
        );
        metrics::describe_gauge!(
            Self::CURSOR_HEIGHT,
            "Next height to fetch, per ingestion stream",
        );
        metrics::describe_counter!(
            Self::BACKFILLED_STATUSES_TOTAL,
            metrics::Unit::Count,
            "Finalization rows written by ancestor backfill",
        );
        metrics::describe_counter!(
            Self::REORGS_TOTAL,
            metrics::Unit::Count,
            "Detected L2 reorgs",
        );
        metrics::describe_counter!(
            Self::ORPHANED_BLOCKS_TOTAL,
            metrics::Unit::Count,
            "L2 blocks marked as orphaned",
        );
        metrics::describe_counter!(
            Self::DROPPED_TXS_TOTAL,
            metrics::Unit::Count,
            "Transactions confirmed as dropped",
        );
        metrics::describe_counter!(
            Self::RECOVERED_TXS_TOTAL,
            metrics::Unit::Count,
            "Suspected drops found in a recent block",
        );
        metrics::describe_histogram!(
            Self::SWEEP_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Duration of a dropped transaction sweep",
        );
        metrics::describe_counter!(
            Self::EVENTS_PUBLISHED_TOTAL,
            metrics::Unit::Count,
            "Events published to the message bus",
        );
        metrics::describe_counter!(
            Self::EVENTS_FAILED_TOTAL,
            metrics::Unit::Count,
            "Events the message bus rejected",
        );
    }

    fn zero() {
        metrics::counter!(Self::FETCH_RETRIES_TOTAL).increment(0);
        metrics::counter!(Self::FETCH_EXHAUSTED_TOTAL).increment(0);
        metrics::counter!(Self::FETCH_SKIPPED_BATCHES_TOTAL).increment(0);
        metrics::counter!(Self::CIRCUIT_BREAKER_OPENED_TOTAL).increment(0);
        metrics::counter!(Self::BACKFILLED_STATUSES_TOTAL).increment(0);
        metrics::counter!(Self::REORGS_TOTAL).increment(0);
        metrics::counter!(Self::ORPHANED_BLOCKS_TOTAL).increment(0);
        metrics::counter!(Self::DROPPED_TXS_TOTAL).increment(0);
        metrics::counter!(Self::RECOVERED_TXS_TOTAL).increment(0);
        metrics::histogram!(Self::SWEEP_DURATION_SECONDS).record(0.0);
        metrics::counter!(Self::EVENTS_PUBLISHED_TOTAL).increment(0);
        metrics::counter!(Self::EVENTS_FAILED_TOTAL).increment(0);
    }
}
