//! Resilient remote reads.

mod breaker;
pub use breaker::CircuitBreaker;

mod pipeline;
pub use pipeline::{BatchedFetch, FetchPipeline};
