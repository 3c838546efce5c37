//! The [`IndexerService`] and its builder.

use crate::{EventLogActor, IndexerActor, IndexerConfig, IntervalActor, ServiceError};
use alloy_rpc_client::RpcClient;
use l2scan_core::{
    BlockProcessor, ChainReader, ChannelBus, CircuitBreaker, Clock, CursorTracker,
    DroppedTxVerifier, EventEmitter, EventPoller, FetchPipeline, FinalizationTracker,
    L1EventKind, L1FinalityStream, L2BlockIngester, Metrics, OrphanRecorder, RpcChainReader,
    SystemClock, TxLifecycleTracker, ValidatorRefresher,
};
use l2scan_storage::{IndexerDb, IndexerStorage, PendingTxStorage};
use l2scan_types::HeightCursorKey;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Default number of messages buffered per lagging bus subscriber.
const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Builder of the [`IndexerService`].
#[derive(Debug)]
pub struct IndexerServiceBuilder {
    config: IndexerConfig,
    bus: Option<ChannelBus>,
    clock: Option<Arc<dyn Clock>>,
}

impl IndexerServiceBuilder {
    /// Publishes events on `bus` instead of a fresh one.
    pub fn with_bus(self, bus: ChannelBus) -> Self {
        Self { bus: Some(bus), ..self }
    }

    /// Reads time from `clock` instead of the system clock.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock: Some(clock), ..self }
    }

    /// Assembles the [`IndexerService`].
    pub fn build(self) -> IndexerService {
        let capacity =
            if self.config.bus_capacity == 0 { DEFAULT_BUS_CAPACITY } else { self.config.bus_capacity };
        IndexerService {
            bus: self.bus.unwrap_or_else(|| ChannelBus::new(capacity)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config: self.config,
        }
    }
}

/// The indexer: one actor per ingestion stream plus the verifier and the validator refresher.
#[derive(Debug)]
pub struct IndexerService {
    config: IndexerConfig,
    bus: ChannelBus,
    clock: Arc<dyn Clock>,
}

impl IndexerService {
    /// Returns a builder for the service.
    pub const fn builder(config: IndexerConfig) -> IndexerServiceBuilder {
        IndexerServiceBuilder { config, bus: None, clock: None }
    }

    /// The bus events are published on.
    pub const fn bus(&self) -> &ChannelBus {
        &self.bus
    }

    /// Returns a transaction lifecycle tracker over `storage` that publishes on this service's
    /// bus.
    ///
    /// The service never submits or ages transactions itself. A submitter sharing the storage
    /// handed to [`Self::run_with`] registers transactions through
    /// [`TxLifecycleTracker::track_submitted`], and the aging process flags stale ones through
    /// [`TxLifecycleTracker::flag_suspected_dropped`]. The verifier then resolves the suspects.
    pub fn tx_tracker<S: PendingTxStorage>(&self, storage: Arc<S>) -> TxLifecycleTracker<S> {
        TxLifecycleTracker::new(storage, EventEmitter::new(Arc::new(self.bus.clone())))
    }

    /// Opens the database and the RPC clients, then runs until `cancel` fires or an actor fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let storage = match &self.config.database_path {
            Some(path) => IndexerDb::new(path)?,
            None => IndexerDb::in_memory()?,
        };
        let chain = RpcChainReader::new(
            RpcClient::new_http(self.config.l1_rpc.clone()),
            RpcClient::new_http(self.config.l2_node_rpc.clone()),
        );
        info!(
            target: "indexer",
            l1_rpc = %self.config.l1_rpc,
            l2_node_rpc = %self.config.l2_node_rpc,
            rollup = %self.config.rollup_address,
            "Starting indexer"
        );
        self.run_with(Arc::new(chain), Arc::new(storage), cancel).await
    }

    /// Runs every actor against the given chain and storage until `cancel` fires or an actor
    /// fails. A failing actor cancels all the others.
    pub async fn run_with<R, S>(
        self,
        chain: Arc<R>,
        storage: Arc<S>,
        cancel: CancellationToken,
    ) -> Result<(), ServiceError>
    where
        R: ChainReader + 'static,
        S: IndexerStorage + 'static,
    {
        Metrics::init();

        let config = &self.config;
        let clock = self.clock.clone();
        let pipeline = |stream: &str| {
            let breaker = CircuitBreaker::new(
                stream,
                config.fetch.circuit_breaker_threshold,
                config.fetch.circuit_breaker_timeout,
                clock.clone(),
            );
            FetchPipeline::new(stream, config.fetch, breaker)
        };
        let emitter = EventEmitter::new(Arc::new(self.bus.clone()));
        let finality = FinalizationTracker::new(storage.clone(), clock.clone());
        let mut tasks = JoinSet::new();

        let processor = BlockProcessor::new(
            storage.clone(),
            OrphanRecorder::new(storage.clone(), clock.clone()),
            finality.clone(),
            TxLifecycleTracker::new(storage.clone(), emitter.clone()),
        );
        let ingester = L2BlockIngester::new(
            chain.clone(),
            storage.clone(),
            pipeline("l2_blocks"),
            processor,
            finality.clone(),
            config.poller.block_chunk_size,
            config.poller.genesis_l2_height,
        );
        spawn(&mut tasks, IntervalActor::new(ingester, config.intervals.blocks, cancel.clone()));

        for kind in [L1EventKind::Proposed, L1EventKind::Proven] {
            for finalized in [false, true] {
                let key = HeightCursorKey::new(
                    "rollup",
                    config.rollup_address,
                    kind.event_name(),
                    finalized,
                );
                let poller = EventPoller::new(
                    key.clone(),
                    kind.signature(),
                    chain.clone(),
                    CursorTracker::new(storage.clone(), config.poller.genesis_l1_height),
                    pipeline(&key.to_string()),
                    config.poller.block_chunk_size,
                );
                let stream = L1FinalityStream::new(
                    kind,
                    finalized,
                    chain.clone(),
                    storage.clone(),
                    poller,
                    finality.clone(),
                    TxLifecycleTracker::new(storage.clone(), emitter.clone()),
                );
                spawn(
                    &mut tasks,
                    IntervalActor::new(stream, config.intervals.l1_events, cancel.clone()),
                );
            }
        }

        let verifier = DroppedTxVerifier::new(
            config.dropped_tx,
            chain.clone(),
            storage.clone(),
            pipeline("dropped_tx_verifier"),
            emitter.clone(),
            clock.clone(),
        );
        spawn(
            &mut tasks,
            IntervalActor::new(verifier, config.intervals.dropped_tx_sweep, cancel.clone()),
        );

        let refresher = ValidatorRefresher::new(
            config.rollup_address,
            chain,
            storage,
            pipeline("validators"),
            emitter,
        );
        spawn(
            &mut tasks,
            IntervalActor::new(refresher, config.intervals.validators, cancel.clone()),
        );

        spawn(&mut tasks, EventLogActor::new(self.bus.subscribe(), cancel.clone()));

        let mut failure = None;
        while let Some(result) = tasks.join_next().await {
            let err = match result {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(err) => ServiceError::Actor { name: "unknown".to_string(), reason: err.to_string() },
            };
            error!(target: "indexer", %err, "Actor stopped unexpectedly, shutting down");
            cancel.cancel();
            failure.get_or_insert(err);
        }

        info!(target: "indexer", "Indexer stopped");
        failure.map_or(Ok(()), Err)
    }
}

fn spawn<A>(tasks: &mut JoinSet<Result<(), ServiceError>>, actor: A)
where
    A: IndexerActor,
    A::Error: Send,
{
    let name = actor.name();
    tasks.spawn(async move {
        actor.start().await.map_err(|err| ServiceError::Actor { name, reason: format!("{err:?}") })
    });
}
