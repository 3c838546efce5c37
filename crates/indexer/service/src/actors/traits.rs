//! [IndexerActor] trait.

use async_trait::async_trait;

/// The [IndexerActor] is a long-running task of the indexer service.
///
/// Actors own everything they need once built and run until their cancellation token fires.
#[async_trait]
pub trait IndexerActor: Send + 'static {
    /// The error type for the actor.
    type Error: std::fmt::Debug;

    /// Human readable name, used in logs and errors.
    fn name(&self) -> String;

    /// Starts the actor.
    async fn start(self) -> Result<(), Self::Error>;
}
