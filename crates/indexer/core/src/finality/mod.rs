//! Finalization tier tracking.

mod tracker;
pub use tracker::FinalizationTracker;

mod l1;
pub use l1::{L1BlockEvent, L1EventKind, L1FinalityStream};
