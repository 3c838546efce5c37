use crate::{Clock, Metrics};
use l2scan_storage::{FinalizationStorage, StorageError};
use l2scan_types::{BlockHash, FinalizationStatus};
use std::sync::Arc;
use tracing::{debug, info};

/// Records finalization tier observations and keeps finality monotonic with height.
#[derive(Debug)]
pub struct FinalizationTracker<S> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for FinalizationTracker<S> {
    fn clone(&self) -> Self {
        Self { storage: self.storage.clone(), clock: self.clock.clone() }
    }
}

impl<S> FinalizationTracker<S>
where
    S: FinalizationStorage,
{
    /// Creates a new [`FinalizationTracker`].
    pub fn new(storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Records that block `number` reached `status`, then backfills its canonical ancestors.
    ///
    /// # Returns
    /// * `Ok(n)` with the number of ancestors that were raised to `status`.
    pub fn record_status(
        &self,
        hash: BlockHash,
        number: u64,
        status: FinalizationStatus,
    ) -> Result<u64, StorageError> {
        let observed_at = self.clock.now_ms();
        if self.storage.record_status(hash, number, status, observed_at)? {
            debug!(
                target: "finality",
                block_hash = %hash,
                block_number = number,
                %status,
                "Recorded finalization status"
            );
        }
        self.ensure_ancestors(number, status)
    }

    /// Raises every canonical block below `number` to at least `status`.
    pub fn ensure_ancestors(
        &self,
        number: u64,
        status: FinalizationStatus,
    ) -> Result<u64, StorageError> {
        let backfilled =
            self.storage.ensure_ancestors_reach_status(number, status, self.clock.now_ms())?;
        if backfilled > 0 {
            info!(
                target: "finality",
                below = number,
                %status,
                backfilled,
                "Backfilled ancestor finalization status"
            );
            metrics::counter!(Metrics::BACKFILLED_STATUSES_TOTAL, "status" => status.to_string())
                .increment(backfilled);
        }
        Ok(backfilled)
    }

    /// Best tier recorded for a block.
    pub fn block_status(&self, hash: BlockHash) -> Result<Option<FinalizationStatus>, StorageError> {
        self.storage.get_block_status(hash)
    }
}
