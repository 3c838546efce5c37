//! Provider for tracked transactions and confirmed drops.

use crate::{StorageError, sql::SqlHash};
use l2scan_types::{DroppedTx, PendingTransaction, PendingTxState, TxHash};
use rusqlite::{Connection, OptionalExtension, ToSql, params, params_from_iter};
use std::str::FromStr;

/// Pending transaction storage that wraps a connection or an open transaction.
pub(crate) struct PendingTxProvider<'c> {
    conn: &'c Connection,
}

impl<'c> PendingTxProvider<'c> {
    pub(crate) const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn insert_pending_tx(&self, tx: &PendingTransaction) -> Result<bool, StorageError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO pending_tx (tx_hash, birth_timestamp, state) \
             VALUES (?1, ?2, ?3)",
            params![SqlHash(tx.tx_hash), tx.birth_timestamp, tx.state.as_str()],
        )?;
        Ok(inserted > 0)
    }

    pub(crate) fn get_pending_tx(
        &self,
        hash: TxHash,
    ) -> Result<Option<PendingTransaction>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT tx_hash, birth_timestamp, state FROM pending_tx WHERE tx_hash = ?1",
                params![SqlHash(hash)],
                |row| {
                    Ok((row.get::<_, SqlHash>(0)?.0, row.get::<_, u64>(1)?, row.get::<_, String>(2)?))
                },
            )
            .optional()?;
        row.map(decode_pending).transpose()
    }

    pub(crate) fn get_pending_txs_in_states(
        &self,
        states: &[PendingTxState],
    ) -> Result<Vec<PendingTransaction>, StorageError> {
        if states.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; states.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT tx_hash, birth_timestamp, state FROM pending_tx \
             WHERE state IN ({placeholders}) ORDER BY birth_timestamp ASC"
        ))?;
        let rows = stmt
            .query_map(params_from_iter(states.iter().map(|s| s.as_str())), |row| {
                Ok((row.get::<_, SqlHash>(0)?.0, row.get::<_, u64>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(decode_pending).collect()
    }

    pub(crate) fn get_pending_txs_included_through(
        &self,
        height: u64,
        states: &[PendingTxState],
    ) -> Result<Vec<PendingTransaction>, StorageError> {
        if states.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; states.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT p.tx_hash, p.birth_timestamp, p.state FROM pending_tx p \
             JOIN l2_block_tx t ON t.tx_hash = p.tx_hash \
             JOIN l2_block b ON b.hash = t.block_hash \
             WHERE b.orphan_timestamp IS NULL AND b.height <= ? AND p.state IN ({placeholders}) \
             ORDER BY p.birth_timestamp ASC"
        ))?;

        let names: Vec<&str> = states.iter().map(|s| s.as_str()).collect();
        let mut args: Vec<&dyn ToSql> = Vec::with_capacity(names.len() + 1);
        args.push(&height);
        args.extend(names.iter().map(|name| name as &dyn ToSql));

        let rows = stmt
            .query_map(args.as_slice(), |row| {
                Ok((row.get::<_, SqlHash>(0)?.0, row.get::<_, u64>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(decode_pending).collect()
    }

    pub(crate) fn advance_pending_tx(
        &self,
        hash: TxHash,
        from: PendingTxState,
        to: PendingTxState,
    ) -> Result<bool, StorageError> {
        let updated = self.conn.execute(
            "UPDATE pending_tx SET state = ?3 WHERE tx_hash = ?1 AND state = ?2",
            params![SqlHash(hash), from.as_str(), to.as_str()],
        )?;
        Ok(updated > 0)
    }

    pub(crate) fn confirm_dropped(
        &self,
        dropped: &[DroppedTx],
    ) -> Result<Vec<DroppedTx>, StorageError> {
        let mut delete = self
            .conn
            .prepare_cached("DELETE FROM pending_tx WHERE tx_hash = ?1 AND state = ?2")?;
        let mut insert = self.conn.prepare_cached(
            "INSERT INTO dropped_tx (tx_hash, created_as_pending_at, dropped_at) VALUES (?1, ?2, ?3)",
        )?;

        let mut confirmed = Vec::with_capacity(dropped.len());
        for tx in dropped {
            let removed = delete
                .execute(params![SqlHash(tx.tx_hash), PendingTxState::SuspectedDropped.as_str()])?;
            if removed == 0 {
                continue;
            }
            insert.execute(params![SqlHash(tx.tx_hash), tx.created_as_pending_at, tx.dropped_at])?;
            confirmed.push(*tx);
        }
        Ok(confirmed)
    }

    pub(crate) fn get_dropped_tx(&self, hash: TxHash) -> Result<Option<DroppedTx>, StorageError> {
        let dropped = self
            .conn
            .query_row(
                "SELECT tx_hash, created_as_pending_at, dropped_at FROM dropped_tx \
                 WHERE tx_hash = ?1",
                params![SqlHash(hash)],
                |row| Ok(DroppedTx::new(row.get::<_, SqlHash>(0)?.0, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        Ok(dropped)
    }
}

fn decode_pending(
    (tx_hash, birth_timestamp, state): (TxHash, u64, String),
) -> Result<PendingTransaction, StorageError> {
    let state = PendingTxState::from_str(&state)
        .map_err(|_| StorageError::CorruptedEntry(format!("pending tx state '{state}'")))?;
    Ok(PendingTransaction::new(tx_hash, birth_timestamp, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{providers::BlockProvider, schema::run_migrations};
    use alloy_primitives::B256;
    use l2scan_types::L2Block;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_query_by_state() {
        let conn = setup_db();
        let provider = PendingTxProvider::new(&conn);
        let a = PendingTransaction::new(B256::repeat_byte(1), 20, PendingTxState::Pending);
        let b = PendingTransaction::new(B256::repeat_byte(2), 10, PendingTxState::SuspectedDropped);
        let c = PendingTransaction::new(B256::repeat_byte(3), 30, PendingTxState::Proven);

        for tx in [&a, &b, &c] {
            assert!(provider.insert_pending_tx(tx).unwrap());
        }
        assert!(!provider.insert_pending_tx(&a).unwrap());

        let tracked = provider
            .get_pending_txs_in_states(&[PendingTxState::Pending, PendingTxState::SuspectedDropped])
            .unwrap();
        assert_eq!(tracked, vec![b, a]);
        assert!(provider.get_pending_txs_in_states(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_advance_is_compare_and_set() {
        let conn = setup_db();
        let provider = PendingTxProvider::new(&conn);
        let hash = B256::repeat_byte(1);
        provider
            .insert_pending_tx(&PendingTransaction::new(hash, 1, PendingTxState::Pending))
            .unwrap();

        assert!(!provider
            .advance_pending_tx(hash, PendingTxState::Proposed, PendingTxState::Proven)
            .unwrap());
        assert!(provider
            .advance_pending_tx(hash, PendingTxState::Pending, PendingTxState::Proposed)
            .unwrap());
        assert_eq!(provider.get_pending_tx(hash).unwrap().unwrap().state, PendingTxState::Proposed);
    }

    #[test]
    fn test_included_through_only_sees_canonical_blocks() {
        let conn = setup_db();
        let blocks = BlockProvider::new(&conn);
        let provider = PendingTxProvider::new(&conn);
        let tx = |n: u8| B256::repeat_byte(n);
        for (n, state) in [
            (1, PendingTxState::Proposed),
            (2, PendingTxState::Pending),
            (3, PendingTxState::Proposed),
            (4, PendingTxState::Proposed),
            (5, PendingTxState::Proven),
        ] {
            provider.insert_pending_tx(&PendingTransaction::new(tx(n), n.into(), state)).unwrap();
        }
        blocks.store_block(&L2Block::new(B256::repeat_byte(0xa1), 1, 1, vec![tx(1), tx(5)])).unwrap();
        blocks.store_block(&L2Block::new(B256::repeat_byte(0xa2), 2, 2, vec![tx(2), tx(4)])).unwrap();
        blocks.store_block(&L2Block::new(B256::repeat_byte(0xa3), 3, 3, vec![tx(3)])).unwrap();
        blocks.mark_orphaned(B256::repeat_byte(0xa2), 10, false).unwrap();
        blocks.store_block(&L2Block::new(B256::repeat_byte(0xb2), 2, 2, vec![tx(2)])).unwrap();

        let open = [PendingTxState::Pending, PendingTxState::Proposed];
        let included: Vec<_> = provider
            .get_pending_txs_included_through(2, &open)
            .unwrap()
            .into_iter()
            .map(|tx| tx.tx_hash)
            .collect();
        assert_eq!(included, vec![tx(1), tx(2)]);
        assert_eq!(provider.get_pending_txs_included_through(3, &open).unwrap().len(), 3);
        assert!(provider.get_pending_txs_included_through(0, &open).unwrap().is_empty());
    }

    #[test]
    fn test_confirm_dropped_moves_suspected_rows() {
        let conn = setup_db();
        let provider = PendingTxProvider::new(&conn);
        let suspected = B256::repeat_byte(9);
        let recovered = B256::repeat_byte(8);
        provider
            .insert_pending_tx(&PendingTransaction::new(suspected, 5, PendingTxState::SuspectedDropped))
            .unwrap();
        provider
            .insert_pending_tx(&PendingTransaction::new(recovered, 6, PendingTxState::Proposed))
            .unwrap();

        let confirmed = provider
            .confirm_dropped(&[DroppedTx::new(suspected, 5, 50), DroppedTx::new(recovered, 6, 50)])
            .unwrap();

        assert_eq!(confirmed, vec![DroppedTx::new(suspected, 5, 50)]);
        assert_eq!(provider.get_pending_tx(suspected).unwrap(), None);
        assert_eq!(provider.get_dropped_tx(suspected).unwrap(), Some(DroppedTx::new(suspected, 5, 50)));
        assert_eq!(provider.get_pending_tx(recovered).unwrap().unwrap().state, PendingTxState::Proposed);
        assert_eq!(provider.get_dropped_tx(recovered).unwrap(), None);

        assert!(provider.confirm_dropped(&[DroppedTx::new(suspected, 5, 60)]).unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_state_is_reported() {
        let conn = setup_db();
        conn.execute(
            "INSERT INTO pending_tx (tx_hash, birth_timestamp, state) VALUES (?1, 1, 'bogus')",
            params![SqlHash(B256::ZERO)],
        )
        .unwrap();
        let err = PendingTxProvider::new(&conn).get_pending_tx(B256::ZERO).unwrap_err();
        assert!(matches!(err, StorageError::CorruptedEntry(_)));
    }
}
