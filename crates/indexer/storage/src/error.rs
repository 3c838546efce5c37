use thiserror::Error;

/// Errors that may occur while interacting with indexer storage.
///
/// This enum is used across all implementations of the storage traits.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error raised by the underlying SQLite database.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The expected entry was not found in the database.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// A persisted value could not be decoded into its domain type.
    #[error("Corrupted entry: {0}")]
    CorruptedEntry(String),

    /// Represents a conflict occurred while attempting to write to the database.
    #[error("Conflict error: {0}")]
    ConflictError(String),
}
