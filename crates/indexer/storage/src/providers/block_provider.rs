//! Provider for L2 blocks and orphan bookkeeping.

use crate::{StorageError, sql::SqlHash};
use l2scan_types::{BlockHash, L2Block, OrphanInfo, OrphanedBlock, Reorg};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, warn};

const BLOCK_COLUMNS: &str =
    "hash, height, timestamp, orphan_timestamp, orphan_has_orphaned_parent";

/// Block storage that wraps a connection or an open transaction.
pub(crate) struct BlockProvider<'c> {
    conn: &'c Connection,
}

impl<'c> BlockProvider<'c> {
    pub(crate) const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn store_block(&self, block: &L2Block) -> Result<bool, StorageError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO l2_block (hash, height, timestamp) VALUES (?1, ?2, ?3)",
            params![SqlHash(block.hash), block.height, block.timestamp],
        )?;

        if inserted == 0 {
            debug!(
                target: "indexer_storage",
                block_hash = %block.hash,
                height = block.height,
                "Block already stored"
            );
            return Ok(false);
        }

        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO l2_block_tx (block_hash, tx_index, tx_hash) VALUES (?1, ?2, ?3)",
        )?;
        for (index, tx_hash) in block.tx_hashes.iter().enumerate() {
            stmt.execute(params![SqlHash(block.hash), index as u64, SqlHash(*tx_hash)])?;
        }

        Ok(true)
    }

    pub(crate) fn get_block(&self, hash: BlockHash) -> Result<L2Block, StorageError> {
        let block = self
            .conn
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM l2_block WHERE hash = ?1"),
                params![SqlHash(hash)],
                block_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::EntryNotFound(format!("block {hash}")))?;
        self.with_tx_hashes(block)
    }

    pub(crate) fn get_canonical_block_at(
        &self,
        height: u64,
    ) -> Result<Option<L2Block>, StorageError> {
        let block = self
            .conn
            .query_row(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM l2_block \
                     WHERE height = ?1 AND orphan_timestamp IS NULL"
                ),
                params![height],
                block_from_row,
            )
            .optional()?;
        block.map(|b| self.with_tx_hashes(b)).transpose()
    }

    pub(crate) fn get_latest_block(
        &self,
        include_orphaned: bool,
    ) -> Result<Option<L2Block>, StorageError> {
        let filter = if include_orphaned { "" } else { "WHERE orphan_timestamp IS NULL" };
        let block = self
            .conn
            .query_row(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM l2_block {filter} \
                     ORDER BY height DESC, orphan_timestamp IS NOT NULL LIMIT 1"
                ),
                [],
                block_from_row,
            )
            .optional()?;
        block.map(|b| self.with_tx_hashes(b)).transpose()
    }

    pub(crate) fn mark_orphaned(
        &self,
        hash: BlockHash,
        timestamp: u64,
        has_orphaned_parent: bool,
    ) -> Result<(), StorageError> {
        let updated = self.conn.execute(
            "UPDATE l2_block SET orphan_timestamp = ?2, orphan_has_orphaned_parent = ?3 \
             WHERE hash = ?1",
            params![SqlHash(hash), timestamp, has_orphaned_parent],
        )?;
        if updated == 0 {
            warn!(target: "indexer_storage", block_hash = %hash, "Cannot orphan unknown block");
            return Err(StorageError::EntryNotFound(format!("block {hash}")));
        }
        Ok(())
    }

    pub(crate) fn orphan_canonical_from(
        &self,
        height: u64,
        timestamp: u64,
    ) -> Result<Vec<OrphanedBlock>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT hash, height FROM l2_block \
             WHERE height >= ?1 AND orphan_timestamp IS NULL ORDER BY height ASC",
        )?;
        let superseded = stmt
            .query_map(params![height], |row| {
                Ok((row.get::<_, SqlHash>(0)?.0, row.get::<_, u64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut orphaned = Vec::with_capacity(superseded.len());
        for (index, (hash, block_height)) in superseded.into_iter().enumerate() {
            let orphan = OrphanInfo::new(timestamp, index > 0);
            self.mark_orphaned(hash, orphan.timestamp, orphan.has_orphaned_parent)?;
            orphaned.push(OrphanedBlock::new(hash, block_height, orphan));
        }
        Ok(orphaned)
    }

    pub(crate) fn get_orphaned_blocks(&self) -> Result<Vec<OrphanedBlock>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT hash, height, orphan_timestamp, orphan_has_orphaned_parent FROM l2_block \
             WHERE orphan_timestamp IS NOT NULL ORDER BY orphan_timestamp DESC, height ASC",
        )?;
        let blocks = stmt
            .query_map([], |row| {
                Ok(OrphanedBlock::new(
                    row.get::<_, SqlHash>(0)?.0,
                    row.get(1)?,
                    OrphanInfo::new(row.get(2)?, row.get(3)?),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    pub(crate) fn get_reorgs(&self) -> Result<Vec<Reorg>, StorageError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT root.hash, root.height, root.orphan_timestamp,
                1 + (
                    SELECT COUNT(*) FROM l2_block child
                    WHERE child.orphan_timestamp = root.orphan_timestamp
                        AND child.orphan_has_orphaned_parent = 1
                )
            FROM l2_block root
            WHERE root.orphan_timestamp IS NOT NULL AND root.orphan_has_orphaned_parent = 0
            ORDER BY root.orphan_timestamp DESC, root.height ASC
            "#,
        )?;
        let reorgs = stmt
            .query_map([], |row| {
                Ok(Reorg {
                    root_hash: row.get::<_, SqlHash>(0)?.0,
                    root_height: row.get(1)?,
                    timestamp: row.get(2)?,
                    orphaned_count: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reorgs)
    }

    fn with_tx_hashes(&self, mut block: L2Block) -> Result<L2Block, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT tx_hash FROM l2_block_tx WHERE block_hash = ?1 ORDER BY tx_index ASC",
        )?;
        block.tx_hashes = stmt
            .query_map(params![SqlHash(block.hash)], |row| Ok(row.get::<_, SqlHash>(0)?.0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(block)
    }
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<L2Block> {
    let orphan_timestamp: Option<u64> = row.get(3)?;
    let has_orphaned_parent: bool = row.get(4)?;
    Ok(L2Block {
        hash: row.get::<_, SqlHash>(0)?.0,
        height: row.get(1)?,
        timestamp: row.get(2)?,
        tx_hashes: Vec::new(),
        orphan: orphan_timestamp.map(|ts| OrphanInfo::new(ts, has_orphaned_parent)),
    })
}
