//! Service wiring of the l2scan indexer.
//!
//! Every ingestion stream runs as its own [`IndexerActor`] and shares one storage handle, one
//! chain reader and one message bus with the others.

mod actors;
pub use actors::{EventLogActor, IndexerActor, IntervalActor, IntervalJob};

mod config;
pub use config::{IndexerConfig, PollIntervals};

mod error;
pub use error::ServiceError;

mod service;
pub use service::{IndexerService, IndexerServiceBuilder};
