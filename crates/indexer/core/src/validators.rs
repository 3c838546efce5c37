use crate::{ChainError, ChainReader, EventEmitter, FetchPipeline, IRollup, IndexerError};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use l2scan_storage::ValidatorStorage;
use l2scan_types::{IndexerEvent, ValidatorRecord, ValidatorSetUpdatedEvent, ValidatorStatus};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reads the attester set from the rollup contract and mirrors it into storage.
#[derive(Debug)]
pub struct ValidatorRefresher<R, S> {
    rollup: Address,
    chain: Arc<R>,
    storage: Arc<S>,
    pipeline: FetchPipeline,
    emitter: EventEmitter,
}

impl<R, S> ValidatorRefresher<R, S>
where
    R: ChainReader,
    S: ValidatorStorage,
{
    /// Creates a new [`ValidatorRefresher`].
    pub const fn new(
        rollup: Address,
        chain: Arc<R>,
        storage: Arc<S>,
        pipeline: FetchPipeline,
        emitter: EventEmitter,
    ) -> Self {
        Self { rollup, chain, storage, pipeline, emitter }
    }

    /// Rereads the full validator set.
    ///
    /// # Returns
    /// * `Ok(Some(n))` if the stored set was replaced with `n` validators.
    /// * `Ok(None)` if some sub-read failed; the stored set is left untouched.
    pub async fn refresh(&self) -> Result<Option<usize>, IndexerError> {
        let count = self
            .pipeline
            .fetch(|| self.call(IRollup::getActiveAttesterCountCall {}))
            .await?;
        let count = u64::try_from(count)
            .map_err(|_| ChainError::InvalidResponse(format!("attester count {count} overflows")))?;
        debug!(target: "validator_refresh", rollup = %self.rollup, count, "Reading attester set");

        let indices = self
            .pipeline
            .fetch_batched((0..count).collect(), |index: u64| {
                self.call(IRollup::getAttesterAtIndexCall { index: U256::from(index) })
            })
            .await;
        if !indices.is_complete() {
            warn!(
                target: "validator_refresh",
                rollup = %self.rollup,
                failed = indices.failed.len() + indices.unfetched.len(),
                "Attester enumeration incomplete, keeping stored set"
            );
            return Ok(None);
        }

        let views = self
            .pipeline
            .fetch_batched(indices.values, |attester| async move {
                let view = self.call(IRollup::getAttesterViewCall { attester }).await?;
                record(attester, view)
            })
            .await;
        if !views.is_complete() {
            warn!(
                target: "validator_refresh",
                rollup = %self.rollup,
                failed = views.failed.len() + views.unfetched.len(),
                "Attester views incomplete, keeping stored set"
            );
            return Ok(None);
        }

        let validators = views.values;
        self.storage.replace_validators(self.rollup, &validators)?;
        info!(
            target: "validator_refresh",
            rollup = %self.rollup,
            validators = validators.len(),
            "Validator set refreshed"
        );

        let stored = validators.len();
        self.emitter
            .emit(IndexerEvent::ValidatorSetUpdated(ValidatorSetUpdatedEvent {
                rollup_address: self.rollup,
                validators,
            }))
            .await;
        Ok(Some(stored))
    }

    async fn call<C: SolCall>(&self, call: C) -> Result<C::Return, ChainError> {
        let data = self
            .chain
            .read_contract(self.rollup, Bytes::from(call.abi_encode()), None)
            .await?;
        Ok(C::abi_decode_returns(&data)?)
    }
}

fn record(attester: Address, view: IRollup::AttesterView) -> Result<ValidatorRecord, ChainError> {
    let status = ValidatorStatus::from_repr(view.status).ok_or_else(|| {
        ChainError::InvalidResponse(format!("unknown status {} for {attester}", view.status))
    })?;
    Ok(ValidatorRecord {
        attester,
        stake: view.effectiveBalance,
        status,
        withdrawer: view.withdrawer,
        proposer: view.proposer,
    })
}
