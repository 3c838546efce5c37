use alloy_transport::TransportError;
use l2scan_storage::StorageError;
use thiserror::Error;

/// Errors returned by a [`ChainReader`](crate::ChainReader).
#[derive(Debug, Error)]
pub enum ChainError {
    /// The RPC transport failed or the node returned an error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The requested block does not exist on the node.
    #[error("block {0} not found")]
    BlockNotFound(u64),

    /// The node answered with a payload that could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// ABI encoding or decoding failed.
    #[error(transparent)]
    Abi(#[from] alloy_sol_types::Error),
}

/// Errors surfaced by the [`FetchPipeline`](crate::FetchPipeline).
#[derive(Debug, Error)]
pub enum FetchError {
    /// The underlying remote read failed.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The stream's circuit breaker is open.
    #[error("circuit breaker open until {open_until_ms}")]
    CircuitOpen {
        /// Unix ms at which the breaker half-opens.
        open_until_ms: u64,
    },

    /// Every attempt failed.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error of the last attempt.
        last: Box<FetchError>,
    },

    /// A fetched item could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Errors raised by the ingestion core.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Represents an error that occurred while interacting with the storage layer.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Represents an error that occurred while fetching from the chain.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A chain read failed outside of the fetch pipeline.
    #[error(transparent)]
    Chain(#[from] ChainError),
}
