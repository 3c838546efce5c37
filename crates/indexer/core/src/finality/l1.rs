use crate::{
    ChainError, ChainReader, EventPoller, FinalizationTracker, IndexerError, TxLifecycleTracker,
    chain::IRollup,
};
use alloy_primitives::{B256, U256};
use alloy_sol_types::SolEvent;
use l2scan_storage::{BlockStorageReader, CursorStorage, FinalizationStorage, PendingTxStorage};
use l2scan_types::{ContractLog, FinalizationStatus};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rollup events that move L2 blocks up the finalization tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum L1EventKind {
    /// `L2BlockProposed`.
    Proposed,
    /// `L2ProofVerified`.
    Proven,
}

impl L1EventKind {
    /// Solidity event name, used as the cursor's event name.
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Proposed => "L2BlockProposed",
            Self::Proven => "L2ProofVerified",
        }
    }

    /// Topic0 of the event.
    pub const fn signature(self) -> B256 {
        match self {
            Self::Proposed => IRollup::L2BlockProposed::SIGNATURE_HASH,
            Self::Proven => IRollup::L2ProofVerified::SIGNATURE_HASH,
        }
    }

    /// Tier reached by a block whose event was observed at the latest or finalized L1 head.
    pub const fn tier(self, finalized: bool) -> FinalizationStatus {
        match (self, finalized) {
            (Self::Proposed, _) => FinalizationStatus::L1MinedProposed,
            (Self::Proven, false) => FinalizationStatus::L1MinedProven,
            (Self::Proven, true) => FinalizationStatus::Finalized,
        }
    }

    /// Decodes a raw rollup log of this kind.
    pub fn decode(self, log: &ContractLog) -> Result<L1BlockEvent, ChainError> {
        if log.topics.first() != Some(&self.signature()) {
            return Err(ChainError::InvalidResponse(format!(
                "log is not a {} event",
                self.event_name()
            )));
        }
        let topics = log.topics.iter().copied();
        let l2_block_number = match self {
            Self::Proposed => IRollup::L2BlockProposed::decode_raw_log(topics, &log.data)?.blockNumber,
            Self::Proven => IRollup::L2ProofVerified::decode_raw_log(topics, &log.data)?.blockNumber,
        };
        Ok(L1BlockEvent {
            kind: self,
            l2_block_number: to_height(l2_block_number)?,
            l1_block_number: log.block_number,
        })
    }
}

fn to_height(value: U256) -> Result<u64, ChainError> {
    u64::try_from(value)
        .map_err(|_| ChainError::InvalidResponse(format!("block number {value} overflows u64")))
}

/// A decoded rollup event about one L2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1BlockEvent {
    /// Kind of the event.
    pub kind: L1EventKind,
    /// L2 height the event refers to.
    pub l2_block_number: u64,
    /// L1 height the event was mined in.
    pub l1_block_number: u64,
}

/// One L1 event stream: a rollup event followed at the latest or the finalized L1 head.
#[derive(Debug)]
pub struct L1FinalityStream<R, S> {
    kind: L1EventKind,
    finalized: bool,
    chain: Arc<R>,
    storage: Arc<S>,
    poller: EventPoller<R, S>,
    finality: FinalizationTracker<S>,
    lifecycle: TxLifecycleTracker<S>,
}

impl<R, S> L1FinalityStream<R, S>
where
    R: ChainReader,
    S: BlockStorageReader + CursorStorage + FinalizationStorage + PendingTxStorage,
{
    /// Creates a new [`L1FinalityStream`].
    pub const fn new(
        kind: L1EventKind,
        finalized: bool,
        chain: Arc<R>,
        storage: Arc<S>,
        poller: EventPoller<R, S>,
        finality: FinalizationTracker<S>,
        lifecycle: TxLifecycleTracker<S>,
    ) -> Self {
        Self { kind, finalized, chain, storage, poller, finality, lifecycle }
    }

    /// Human readable name of the stream.
    pub fn name(&self) -> String {
        self.poller.key().to_string()
    }

    /// Polls one window of events towards the current L1 head and applies them.
    ///
    /// # Returns
    /// * `Ok(n)` with the number of events applied to a known L2 block.
    pub async fn tick(&self) -> Result<usize, IndexerError> {
        let target =
            self.poller.pipeline().fetch(|| self.chain.get_l1_head(self.finalized)).await?;
        let Some(polled) = self.poller.poll(target, |log| self.kind.decode(log)).await? else {
            return Ok(0);
        };

        let mut applied = 0;
        for event in &polled.events {
            if self.apply(event)? {
                applied += 1;
            }
        }
        self.poller.commit(&polled.window)?;

        if applied > 0 {
            info!(
                target: "finality",
                stream = %self.poller.key(),
                applied,
                to = polled.window.to,
                "Applied L1 events"
            );
        }
        Ok(applied)
    }

    fn apply(&self, event: &L1BlockEvent) -> Result<bool, IndexerError> {
        let Some(block) = self.storage.get_canonical_block_at(event.l2_block_number)? else {
            warn!(
                target: "finality",
                event = self.kind.event_name(),
                l2_block_number = event.l2_block_number,
                l1_block_number = event.l1_block_number,
                "No canonical L2 block for event, skipping"
            );
            return Ok(false);
        };

        let status = self.kind.tier(self.finalized);
        let backfilled = self.finality.record_status(block.hash, block.height, status)?;
        let promoted =
            if status.is_proven() { self.lifecycle.promote_proven_through(block.height)? } else { 0 };
        debug!(
            target: "finality",
            event = self.kind.event_name(),
            l2_block_number = block.height,
            %status,
            backfilled,
            promoted,
            "Applied L1 event"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CircuitBreaker, CursorTracker, EventEmitter, FetchConfig, FetchPipeline,
        test_utils::{FakeChain, ManualClock, RecordingBus},
    };
    use alloy_primitives::Address;
    use l2scan_storage::{BlockStorageWriter, IndexerDb};
    use l2scan_types::{HeightCursorKey, L2Block, PendingTransaction, PendingTxState};
    use rstest::rstest;

    const ROLLUP: Address = Address::repeat_byte(0xee);

    fn hash(height: u64) -> B256 {
        B256::left_padding_from(&height.to_be_bytes())
    }

    fn proposed_log(l2_height: u64, l1_height: u64) -> ContractLog {
        let event = IRollup::L2BlockProposed {
            blockNumber: U256::from(l2_height),
            archive: B256::repeat_byte(0xab),
            versionedBlobHashes: vec![B256::repeat_byte(1)],
        };
        contract_log(event.encode_log_data(), l1_height)
    }

    fn proven_log(l2_height: u64, l1_height: u64) -> ContractLog {
        let event = IRollup::L2ProofVerified {
            blockNumber: U256::from(l2_height),
            proverId: Address::repeat_byte(7),
        };
        contract_log(event.encode_log_data(), l1_height)
    }

    fn contract_log(data: alloy_primitives::LogData, l1_height: u64) -> ContractLog {
        ContractLog {
            address: ROLLUP,
            block_number: l1_height,
            transaction_hash: B256::repeat_byte(0x55),
            log_index: 0,
            topics: data.topics().to_vec(),
            data: data.data,
        }
    }

    fn stream(
        kind: L1EventKind,
        finalized: bool,
        chain: Arc<FakeChain>,
        db: Arc<IndexerDb>,
    ) -> L1FinalityStream<FakeChain, IndexerDb> {
        let clock = Arc::new(ManualClock::new(100));
        let config = FetchConfig::default();
        let breaker = CircuitBreaker::new("l1", 5, config.circuit_breaker_timeout, clock.clone());
        let key = HeightCursorKey::new("rollup", ROLLUP, kind.event_name(), finalized);
        let poller = EventPoller::new(
            key,
            kind.signature(),
            chain.clone(),
            CursorTracker::new(db.clone(), 1),
            FetchPipeline::new("l1", config, breaker),
            1_000,
        );
        L1FinalityStream::new(
            kind,
            finalized,
            chain,
            db.clone(),
            poller,
            FinalizationTracker::new(db.clone(), clock),
            TxLifecycleTracker::new(db, EventEmitter::new(Arc::new(RecordingBus::default()))),
        )
    }

    #[rstest]
    #[case(L1EventKind::Proposed, false, FinalizationStatus::L1MinedProposed)]
    #[case(L1EventKind::Proposed, true, FinalizationStatus::L1MinedProposed)]
    #[case(L1EventKind::Proven, false, FinalizationStatus::L1MinedProven)]
    #[case(L1EventKind::Proven, true, FinalizationStatus::Finalized)]
    fn test_event_tiers(
        #[case] kind: L1EventKind,
        #[case] finalized: bool,
        #[case] expected: FinalizationStatus,
    ) {
        assert_eq!(kind.tier(finalized), expected);
    }

    #[test]
    fn test_decode_events() {
        let proposed = L1EventKind::Proposed.decode(&proposed_log(12, 300)).unwrap();
        assert_eq!(proposed.l2_block_number, 12);
        assert_eq!(proposed.l1_block_number, 300);

        let proven = L1EventKind::Proven.decode(&proven_log(9, 301)).unwrap();
        assert_eq!(proven.l2_block_number, 9);

        assert!(L1EventKind::Proven.decode(&proposed_log(1, 1)).is_err());

        let mut truncated = proven_log(9, 301);
        truncated.topics.truncate(1);
        assert!(L1EventKind::Proven.decode(&truncated).is_err());
    }

    #[tokio::test]
    async fn test_finalized_proof_finalizes_block_and_ancestors() {
        let chain = Arc::new(FakeChain::default());
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        for h in 1..=4 {
            db.store_block(&L2Block::new(hash(h), h, h, vec![])).unwrap();
        }
        chain.push_log(proven_log(3, 50));
        // refers to a block the indexer has not seen yet
        chain.push_log(proven_log(40, 51));
        chain.set_l1_heads(60, 55);

        let stream = stream(L1EventKind::Proven, true, chain, db.clone());
        assert_eq!(stream.tick().await.unwrap(), 1);

        for h in 1..=3 {
            assert_eq!(db.get_block_status(hash(h)).unwrap(), Some(FinalizationStatus::Finalized));
        }
        assert_eq!(db.get_block_status(hash(4)).unwrap(), None);
        assert_eq!(db.get_cursor(stream.poller.key()).unwrap(), Some(56));
    }

    #[tokio::test]
    async fn test_proof_event_promotes_included_txs() {
        let chain = Arc::new(FakeChain::default());
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        let tx = B256::repeat_byte(0x42);
        let later = B256::repeat_byte(0x43);
        db.insert_pending_tx(&PendingTransaction::new(tx, 1, PendingTxState::Proposed)).unwrap();
        db.insert_pending_tx(&PendingTransaction::new(later, 1, PendingTxState::Proposed)).unwrap();
        db.store_block(&L2Block::new(hash(1), 1, 1, vec![tx])).unwrap();
        db.store_block(&L2Block::new(hash(2), 2, 2, vec![])).unwrap();
        db.store_block(&L2Block::new(hash(3), 3, 3, vec![later])).unwrap();
        chain.push_log(proven_log(2, 58));
        chain.set_l1_heads(60, 55);

        let stream = stream(L1EventKind::Proven, false, chain, db.clone());
        assert_eq!(stream.tick().await.unwrap(), 1);
        assert_eq!(db.get_pending_tx(tx).unwrap().unwrap().state, PendingTxState::Proven);
        assert_eq!(db.get_pending_tx(later).unwrap().unwrap().state, PendingTxState::Proposed);
    }

    #[tokio::test]
    async fn test_proposal_event_leaves_txs_alone() {
        let chain = Arc::new(FakeChain::default());
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        let tx = B256::repeat_byte(0x42);
        db.insert_pending_tx(&PendingTransaction::new(tx, 1, PendingTxState::Proposed)).unwrap();
        db.store_block(&L2Block::new(hash(1), 1, 1, vec![tx])).unwrap();
        chain.push_log(proposed_log(1, 58));
        chain.set_l1_heads(60, 55);

        let stream = stream(L1EventKind::Proposed, false, chain, db.clone());
        assert_eq!(stream.tick().await.unwrap(), 1);
        assert_eq!(db.get_pending_tx(tx).unwrap().unwrap().state, PendingTxState::Proposed);
    }

    #[tokio::test]
    async fn test_latest_stream_follows_unfinalized_head() {
        let chain = Arc::new(FakeChain::default());
        let db = Arc::new(IndexerDb::in_memory().unwrap());
        db.store_block(&L2Block::new(hash(1), 1, 1, vec![])).unwrap();
        chain.push_log(proposed_log(1, 58));
        chain.set_l1_heads(60, 55);

        let stream = stream(L1EventKind::Proposed, false, chain, db.clone());
        assert_eq!(stream.tick().await.unwrap(), 1);
        assert_eq!(
            db.get_block_status(hash(1)).unwrap(),
            Some(FinalizationStatus::L1MinedProposed)
        );
        assert_eq!(db.get_cursor(stream.poller.key()).unwrap(), Some(61));
    }
}
