//! Provider for per-stream height cursors.

use crate::{StorageError, sql::SqlAddress};
use l2scan_types::HeightCursorKey;
use rusqlite::{Connection, OptionalExtension, params};

/// Cursor storage that wraps a connection or an open transaction.
pub(crate) struct CursorProvider<'c> {
    conn: &'c Connection,
}

impl<'c> CursorProvider<'c> {
    pub(crate) const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn get_cursor(&self, key: &HeightCursorKey) -> Result<Option<u64>, StorageError> {
        let height = self
            .conn
            .query_row(
                "SELECT from_block_height FROM height_cursor \
                 WHERE source_contract = ?1 AND source_address = ?2 \
                 AND event_name = ?3 AND is_finalized = ?4",
                params![
                    key.source_contract,
                    SqlAddress(key.source_address),
                    key.event_name,
                    key.is_finalized
                ],
                |row| row.get(0),
            )
            .optional()?;
        Ok(height)
    }

    /// Monotonic upsert: the stored height only ever grows.
    pub(crate) fn set_cursor(&self, key: &HeightCursorKey, height: u64) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO height_cursor \
             (source_contract, source_address, event_name, is_finalized, from_block_height) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (source_contract, source_address, event_name, is_finalized) \
             DO UPDATE SET from_block_height = MAX(from_block_height, excluded.from_block_height)",
            params![
                key.source_contract,
                SqlAddress(key.source_address),
                key.event_name,
                key.is_finalized,
                height
            ],
        )?;
        Ok(())
    }

    pub(crate) fn set_override_cursor(
        &self,
        key: &HeightCursorKey,
        height: u64,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO height_cursor \
             (source_contract, source_address, event_name, is_finalized, from_block_height) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (source_contract, source_address, event_name, is_finalized) \
             DO UPDATE SET from_block_height = excluded.from_block_height",
            params![
                key.source_contract,
                SqlAddress(key.source_address),
                key.event_name,
                key.is_finalized,
                height
            ],
        )?;
        Ok(())
    }
}
