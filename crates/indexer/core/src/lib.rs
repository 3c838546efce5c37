//! Ingestion and consistency core of the l2scan indexer.
//!
//! Remote reads go through a per-stream [`FetchPipeline`] (retries, backoff and a
//! [`CircuitBreaker`]). Streams resume from persisted height cursors, blocks are processed by
//! the [`BlockProcessor`] and derived facts are published through the [`EventEmitter`].

mod clock;
pub use clock::{Clock, SystemClock};

mod config;
pub use config::{DroppedTxConfig, FetchConfig, PollerConfig};

mod error;
pub use error::{ChainError, FetchError, IndexerError};

mod metrics;
pub use metrics::Metrics;

mod fetch;
pub use fetch::{BatchedFetch, CircuitBreaker, FetchPipeline};

mod chain;
pub use chain::{ChainReader, IRollup, RpcChainReader};

mod emitter;
pub use emitter::{BusError, BusMessage, ChannelBus, EventEmitter, MessageBus};

mod cursor;
pub use cursor::CursorTracker;

mod poller;
pub use poller::{EventPoller, PollWindow, PolledEvents};

mod finality;
pub use finality::{FinalizationTracker, L1BlockEvent, L1EventKind, L1FinalityStream};

mod orphan;
pub use orphan::OrphanRecorder;

mod lifecycle;
pub use lifecycle::TxLifecycleTracker;

mod processor;
pub use processor::{BlockProcessor, ProcessedBlock};

mod ingest;
pub use ingest::{IngestSummary, L2BlockIngester};

mod verifier;
pub use verifier::{DroppedTxVerifier, SweepSummary};

mod validators;
pub use validators::ValidatorRefresher;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
