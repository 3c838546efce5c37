use crate::{ChainError, ChainReader, CursorTracker, FetchPipeline, IndexerError};
use alloy_primitives::{Address, B256};
use l2scan_storage::{CursorStorage, StorageError};
use l2scan_types::{ContractLog, HeightCursorKey};
use std::sync::Arc;
use tracing::{debug, warn};

/// Inclusive range of heights covered by one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    /// First height of the window.
    pub from: u64,
    /// Last height of the window.
    pub to: u64,
    /// Height the poll was aiming for.
    pub target: u64,
}

impl PollWindow {
    /// Computes the window starting at `from`, capped at `chunk_size` heights.
    ///
    /// Returns `None` if the stream is already past `target`.
    pub fn capped(from: u64, target: u64, chunk_size: u64) -> Option<Self> {
        if from > target {
            return None;
        }
        let to = target.min(from.saturating_add(chunk_size.max(1) - 1));
        Some(Self { from, to, target })
    }

    /// Returns true if the window stops short of the target.
    pub const fn is_capped(&self) -> bool {
        self.to < self.target
    }
}

/// Decoded events of one window.
#[derive(Debug)]
pub struct PolledEvents<T> {
    /// The window that was fetched.
    pub window: PollWindow,
    /// Events that decoded successfully, in log order.
    pub events: Vec<T>,
    /// Number of logs that failed to decode.
    pub undecodable: usize,
}

/// Cursor-driven, chunked polling of one contract event.
#[derive(Debug)]
pub struct EventPoller<R, S> {
    key: HeightCursorKey,
    event: B256,
    chain: Arc<R>,
    cursors: CursorTracker<S>,
    pipeline: FetchPipeline,
    chunk_size: u64,
}

impl<R, S> EventPoller<R, S>
where
    R: ChainReader,
    S: CursorStorage,
{
    /// Creates a poller for the stream `key` matching logs with topic0 `event`.
    pub const fn new(
        key: HeightCursorKey,
        event: B256,
        chain: Arc<R>,
        cursors: CursorTracker<S>,
        pipeline: FetchPipeline,
        chunk_size: u64,
    ) -> Self {
        Self { key, event, chain, cursors, pipeline, chunk_size }
    }

    /// Identity of the polled stream.
    pub const fn key(&self) -> &HeightCursorKey {
        &self.key
    }

    /// The stream's fetch pipeline.
    pub const fn pipeline(&self) -> &FetchPipeline {
        &self.pipeline
    }

    /// Address of the polled contract.
    pub const fn address(&self) -> Address {
        self.key.source_address
    }

    /// Next window to fetch towards `target`.
    pub fn next_window(&self, target: u64) -> Result<Option<PollWindow>, StorageError> {
        let from = self.cursors.get_cursor(&self.key)?;
        Ok(PollWindow::capped(from, target, self.chunk_size))
    }

    /// Fetches the logs of the next window and decodes them with `decode`.
    ///
    /// Logs that fail to decode are logged and excluded. The cursor is not moved; call
    /// [`Self::commit`] once the events are persisted.
    pub async fn poll<T, D>(
        &self,
        target: u64,
        decode: D,
    ) -> Result<Option<PolledEvents<T>>, IndexerError>
    where
        D: Fn(&ContractLog) -> Result<T, ChainError>,
    {
        let Some(window) = self.next_window(target)? else {
            debug!(target: "event_poller", stream = %self.key, target, "Stream is up to date");
            return Ok(None);
        };

        let logs = self
            .pipeline
            .fetch(|| {
                self.chain.get_contract_events(self.address(), self.event, window.from, window.to)
            })
            .await?;

        let mut events = Vec::with_capacity(logs.len());
        let mut undecodable = 0;
        for log in &logs {
            match decode(log) {
                Ok(event) => events.push(event),
                Err(err) => {
                    undecodable += 1;
                    warn!(
                        target: "event_poller",
                        stream = %self.key,
                        block_number = log.block_number,
                        tx_hash = %log.transaction_hash,
                        log_index = log.log_index,
                        %err,
                        "Skipping undecodable log"
                    );
                }
            }
        }

        debug!(
            target: "event_poller",
            stream = %self.key,
            from = window.from,
            to = window.to,
            target,
            logs = logs.len(),
            "Polled event window"
        );
        Ok(Some(PolledEvents { window, events, undecodable }))
    }

    /// Moves the cursor past `window`.
    ///
    /// A capped window checkpoints the cursor right after its last height. Otherwise the cursor
    /// advances past the target.
    pub fn commit(&self, window: &PollWindow) -> Result<(), StorageError> {
        if window.is_capped() {
            self.cursors.set_override_cursor(&self.key, window.to + 1)
        } else {
            self.cursors.set_cursor(&self.key, window.target + 1)
        }
    }
}
