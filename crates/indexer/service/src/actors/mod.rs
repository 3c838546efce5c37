//! [IndexerActor] services for the indexer.
//!
//! [IndexerActor]: super::IndexerActor

mod traits;
pub use traits::IndexerActor;

mod interval;
pub use interval::IntervalActor;

mod jobs;
pub use jobs::IntervalJob;

mod events;
pub use events::EventLogActor;
