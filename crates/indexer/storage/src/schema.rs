//! Database schema migrations.

use crate::StorageError;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version, stored in `PRAGMA user_version`.
pub(crate) const SCHEMA_VERSION: i32 = 2;

/// Brings the schema of `conn` up to [`SCHEMA_VERSION`].
pub(crate) fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    debug!(
        target: "indexer_storage",
        current_version,
        target_version = SCHEMA_VERSION,
        "Running migrations"
    );

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < 2 {
        migrate_v2(conn)?;
    }

    if current_version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        info!(target: "indexer_storage", version = SCHEMA_VERSION, "Database schema migrated");
    }

    Ok(())
}

/// Blocks, finalization ledger, tracked transactions and cursors.
fn migrate_v1(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS l2_block (
            hash BLOB PRIMARY KEY NOT NULL,
            height INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            orphan_timestamp INTEGER,
            orphan_has_orphaned_parent INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS l2_block_height_idx ON l2_block(height);
        CREATE INDEX IF NOT EXISTS l2_block_orphan_idx ON l2_block(orphan_timestamp);

        CREATE TABLE IF NOT EXISTS l2_block_tx (
            block_hash BLOB NOT NULL REFERENCES l2_block(hash),
            tx_index INTEGER NOT NULL,
            tx_hash BLOB NOT NULL,
            PRIMARY KEY (block_hash, tx_hash)
        );
        CREATE INDEX IF NOT EXISTS l2_block_tx_hash_idx ON l2_block_tx(tx_hash);

        CREATE TABLE IF NOT EXISTS finalization_status (
            l2_block_hash BLOB NOT NULL,
            l2_block_number INTEGER NOT NULL,
            status INTEGER NOT NULL,
            observed_at INTEGER NOT NULL,
            PRIMARY KEY (l2_block_hash, l2_block_number, status)
        );
        CREATE INDEX IF NOT EXISTS finalization_status_number_idx
            ON finalization_status(l2_block_number, status);

        CREATE TABLE IF NOT EXISTS pending_tx (
            tx_hash BLOB PRIMARY KEY NOT NULL,
            birth_timestamp INTEGER NOT NULL,
            state TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS pending_tx_state_idx ON pending_tx(state);

        CREATE TABLE IF NOT EXISTS dropped_tx (
            tx_hash BLOB PRIMARY KEY NOT NULL,
            created_as_pending_at INTEGER NOT NULL,
            dropped_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS height_cursor (
            source_contract TEXT NOT NULL,
            source_address BLOB NOT NULL,
            event_name TEXT NOT NULL,
            is_finalized INTEGER NOT NULL,
            from_block_height INTEGER NOT NULL,
            PRIMARY KEY (source_contract, source_address, event_name, is_finalized)
        );
        "#,
    )?;
    Ok(())
}

/// Validator set.
fn migrate_v2(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS validator (
            rollup_address BLOB NOT NULL,
            attester BLOB NOT NULL,
            stake TEXT NOT NULL,
            status TEXT NOT NULL,
            withdrawer BLOB NOT NULL,
            proposer BLOB NOT NULL,
            PRIMARY KEY (rollup_address, attester)
        );
        "#,
    )?;
    Ok(())
}
