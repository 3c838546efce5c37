use l2scan_storage::StorageError;
use thiserror::Error;

/// Errors raised while starting or running the indexer service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The database could not be opened or migrated.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An actor task ended with an error or panicked.
    #[error("actor {name} failed: {reason}")]
    Actor {
        /// Name of the failed actor.
        name: String,
        /// Failure description.
        reason: String,
    },
}
