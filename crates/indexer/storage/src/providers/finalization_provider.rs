//! Provider for the append-only finalization status ledger.

use crate::{StorageError, sql::SqlHash};
use l2scan_types::{BlockHash, FinalizationStatus, FinalizationStatusRecord};
use rusqlite::{Connection, params};
use tracing::{debug, info};

/// Number of backfilled rows between two progress logs.
const BACKFILL_PROGRESS_INTERVAL: u64 = 1_000;

/// Finalization ledger storage that wraps a connection or an open transaction.
pub(crate) struct FinalizationProvider<'c> {
    conn: &'c Connection,
}

impl<'c> FinalizationProvider<'c> {
    pub(crate) const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn record_status(
        &self,
        hash: BlockHash,
        number: u64,
        status: FinalizationStatus,
        observed_at: u64,
    ) -> Result<bool, StorageError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO finalization_status \
             (l2_block_hash, l2_block_number, status, observed_at) VALUES (?1, ?2, ?3, ?4)",
            params![SqlHash(hash), number, status.as_u8(), observed_at],
        )?;
        Ok(inserted > 0)
    }

    pub(crate) fn get_block_status(
        &self,
        hash: BlockHash,
    ) -> Result<Option<FinalizationStatus>, StorageError> {
        let best: Option<u8> = self.conn.query_row(
            "SELECT MAX(status) FROM finalization_status WHERE l2_block_hash = ?1",
            params![SqlHash(hash)],
            |row| row.get(0),
        )?;
        best.map(decode_status).transpose()
    }

    pub(crate) fn get_status_records(
        &self,
        hash: BlockHash,
    ) -> Result<Vec<FinalizationStatusRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT l2_block_hash, l2_block_number, status, observed_at FROM finalization_status \
             WHERE l2_block_hash = ?1 ORDER BY status ASC",
        )?;
        let rows = stmt
            .query_map(params![SqlHash(hash)], |row| {
                Ok((
                    row.get::<_, SqlHash>(0)?.0,
                    row.get::<_, u64>(1)?,
                    row.get::<_, u8>(2)?,
                    row.get::<_, u64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(l2_block_hash, l2_block_number, status, observed_at)| {
                Ok(FinalizationStatusRecord {
                    l2_block_hash,
                    l2_block_number,
                    status: decode_status(status)?,
                    observed_at,
                })
            })
            .collect()
    }

    /// Expected to run inside a transaction so that readers never observe a half-applied
    /// backfill.
    pub(crate) fn ensure_ancestors_reach_status(
        &self,
        number: u64,
        status: FinalizationStatus,
        observed_at: u64,
    ) -> Result<u64, StorageError> {
        let mut lagging = self.conn.prepare(
            r#"
            SELECT hash, height FROM l2_block
            WHERE height < ?1 AND orphan_timestamp IS NULL
            EXCEPT
            SELECT l2_block_hash, l2_block_number FROM finalization_status
            WHERE status >= ?2
            "#,
        )?;
        let candidates = lagging
            .query_map(params![number, status.as_u8()], |row| {
                Ok((row.get::<_, SqlHash>(0)?.0, row.get::<_, u64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if candidates.is_empty() {
            return Ok(0);
        }

        debug!(
            target: "indexer_storage",
            below = number,
            %status,
            candidates = candidates.len(),
            "Backfilling ancestors"
        );

        let mut backfilled = 0u64;
        for (hash, height) in candidates {
            if self.record_status(hash, height, status, observed_at)? {
                backfilled += 1;
                if backfilled % BACKFILL_PROGRESS_INTERVAL == 0 {
                    info!(
                        target: "indexer_storage",
                        backfilled,
                        %status,
                        "Ancestor backfill in progress"
                    );
                }
            }
        }

        Ok(backfilled)
    }
}

fn decode_status(raw: u8) -> Result<FinalizationStatus, StorageError> {
    FinalizationStatus::from_repr(raw)
        .ok_or_else(|| StorageError::CorruptedEntry(format!("finalization status {raw}")))
}
