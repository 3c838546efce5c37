use async_trait::async_trait;
use l2scan_core::{
    ChainReader, DroppedTxVerifier, L1FinalityStream, L2BlockIngester, ValidatorRefresher,
};
use l2scan_storage::IndexerStorage;
use tracing::{error, warn};

/// One unit of periodic work driven by an [`IntervalActor`](crate::IntervalActor).
///
/// A run never fails: errors are logged and the next run starts over from persisted state.
#[async_trait]
pub trait IntervalJob: Send + Sync + 'static {
    /// Human readable name of the job.
    fn name(&self) -> String;

    /// Executes one run of the job.
    async fn run_once(&self);
}

#[async_trait]
impl<R, S> IntervalJob for L2BlockIngester<R, S>
where
    R: ChainReader + 'static,
    S: IndexerStorage + 'static,
{
    fn name(&self) -> String {
        "l2_blocks".to_string()
    }

    async fn run_once(&self) {
        if let Err(err) = self.tick().await {
            warn!(target: "event_poller", %err, "L2 block ingestion tick failed");
        }
    }
}

#[async_trait]
impl<R, S> IntervalJob for L1FinalityStream<R, S>
where
    R: ChainReader + 'static,
    S: IndexerStorage + 'static,
{
    fn name(&self) -> String {
        L1FinalityStream::name(self)
    }

    async fn run_once(&self) {
        if let Err(err) = self.tick().await {
            warn!(target: "finality", stream = %self.name(), %err, "L1 event tick failed");
        }
    }
}

#[async_trait]
impl<R, S> IntervalJob for DroppedTxVerifier<R, S>
where
    R: ChainReader + 'static,
    S: IndexerStorage + 'static,
{
    fn name(&self) -> String {
        "dropped_tx_verifier".to_string()
    }

    async fn run_once(&self) {
        self.sweep().await;
    }
}

#[async_trait]
impl<R, S> IntervalJob for ValidatorRefresher<R, S>
where
    R: ChainReader + 'static,
    S: IndexerStorage + 'static,
{
    fn name(&self) -> String {
        "validator_refresh".to_string()
    }

    async fn run_once(&self) {
        if let Err(err) = self.refresh().await {
            error!(target: "validator_refresh", %err, "Validator refresh failed");
        }
    }
}
