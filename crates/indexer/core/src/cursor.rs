use crate::Metrics;
use l2scan_storage::{CursorStorage, StorageError};
use l2scan_types::HeightCursorKey;
use std::sync::Arc;
use tracing::debug;

/// Resumable per-stream height cursors with a genesis default.
#[derive(Debug)]
pub struct CursorTracker<S> {
    storage: Arc<S>,
    genesis_height: u64,
}

impl<S> Clone for CursorTracker<S> {
    fn clone(&self) -> Self {
        Self { storage: self.storage.clone(), genesis_height: self.genesis_height }
    }
}

impl<S> CursorTracker<S>
where
    S: CursorStorage,
{
    /// Creates a tracker that starts unknown streams at `genesis_height`.
    pub const fn new(storage: Arc<S>, genesis_height: u64) -> Self {
        Self { storage, genesis_height }
    }

    /// Next height to fetch for `key`.
    pub fn get_cursor(&self, key: &HeightCursorKey) -> Result<u64, StorageError> {
        Ok(self.storage.get_cursor(key)?.unwrap_or(self.genesis_height))
    }

    /// Advances the cursor of `key`. Never moves it backwards.
    pub fn set_cursor(&self, key: &HeightCursorKey, height: u64) -> Result<(), StorageError> {
        self.storage.set_cursor(key, height)?;
        debug!(target: "event_poller", stream = %key, height, "Cursor advanced");
        metrics::gauge!(Metrics::CURSOR_HEIGHT, "stream" => key.to_string()).set(height as f64);
        Ok(())
    }

    /// Checkpoints the cursor of `key` at exactly `height`.
    pub fn set_override_cursor(
        &self,
        key: &HeightCursorKey,
        height: u64,
    ) -> Result<(), StorageError> {
        self.storage.set_override_cursor(key, height)?;
        debug!(target: "event_poller", stream = %key, height, "Cursor checkpointed");
        metrics::gauge!(Metrics::CURSOR_HEIGHT, "stream" => key.to_string()).set(height as f64);
        Ok(())
    }
}
