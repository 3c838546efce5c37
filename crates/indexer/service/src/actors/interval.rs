use crate::{IndexerActor, IntervalJob, ServiceError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Runs an [`IntervalJob`] every `interval` until cancelled.
///
/// A run is never interrupted half-way; cancellation is observed between runs and while
/// waiting for the next one.
#[derive(Debug, derive_more::Constructor)]
pub struct IntervalActor<J> {
    job: J,
    interval: Duration,
    cancel_token: CancellationToken,
}

#[async_trait]
impl<J> IndexerActor for IntervalActor<J>
where
    J: IntervalJob,
{
    type Error = ServiceError;

    fn name(&self) -> String {
        self.job.name()
    }

    async fn start(self) -> Result<(), Self::Error> {
        let name = self.job.name();
        info!(
            target: "indexer::interval_actor",
            job = %name,
            interval = ?self.interval,
            "Starting interval actor"
        );

        loop {
            if self.cancel_token.is_cancelled() {
                break;
            }
            self.job.run_once().await;

            tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        info!(target: "indexer::interval_actor", job = %name, "Interval actor stopped");
        Ok(())
    }
}
