//! Provider for the rollup validator set.

use crate::{StorageError, sql::SqlAddress};
use alloy_primitives::{Address, U256};
use l2scan_types::{ValidatorRecord, ValidatorStatus};
use rusqlite::{Connection, params};
use std::str::FromStr;

/// Validator storage that wraps a connection or an open transaction.
pub(crate) struct ValidatorProvider<'c> {
    conn: &'c Connection,
}

impl<'c> ValidatorProvider<'c> {
    pub(crate) const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Expected to run inside a transaction.
    pub(crate) fn replace_validators(
        &self,
        rollup: Address,
        validators: &[ValidatorRecord],
    ) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM validator WHERE rollup_address = ?1", params![SqlAddress(rollup)])?;

        let mut insert = self.conn.prepare_cached(
            "INSERT OR REPLACE INTO validator \
             (rollup_address, attester, stake, status, withdrawer, proposer) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for validator in validators {
            insert.execute(params![
                SqlAddress(rollup),
                SqlAddress(validator.attester),
                validator.stake.to_string(),
                validator.status.to_string(),
                SqlAddress(validator.withdrawer),
                SqlAddress(validator.proposer),
            ])?;
        }
        Ok(())
    }

    pub(crate) fn get_validators(
        &self,
        rollup: Address,
    ) -> Result<Vec<ValidatorRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT attester, stake, status, withdrawer, proposer FROM validator \
             WHERE rollup_address = ?1 ORDER BY attester ASC",
        )?;
        let rows = stmt
            .query_map(params![SqlAddress(rollup)], |row| {
                Ok((
                    row.get::<_, SqlAddress>(0)?.0,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, SqlAddress>(3)?.0,
                    row.get::<_, SqlAddress>(4)?.0,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(attester, stake, status, withdrawer, proposer)| {
                let stake = U256::from_str_radix(&stake, 10)
                    .map_err(|_| StorageError::CorruptedEntry(format!("validator stake '{stake}'")))?;
                let status = ValidatorStatus::from_str(&status).map_err(|_| {
                    StorageError::CorruptedEntry(format!("validator status '{status}'"))
                })?;
                Ok(ValidatorRecord { attester, stake, status, withdrawer, proposer })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;

    fn validator(seed: u8, stake: u64, status: ValidatorStatus) -> ValidatorRecord {
        ValidatorRecord {
            attester: Address::repeat_byte(seed),
            stake: U256::from(stake) * U256::from(10u64).pow(U256::from(18u64)),
            status,
            withdrawer: Address::repeat_byte(seed.wrapping_add(0x40)),
            proposer: Address::repeat_byte(seed.wrapping_add(0x80)),
        }
    }

    #[test]
    fn test_replace_validator_set() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let provider = ValidatorProvider::new(&conn);
        let rollup = Address::repeat_byte(0xee);

        provider
            .replace_validators(
                rollup,
                &[validator(1, 100, ValidatorStatus::Validating), validator(2, 5, ValidatorStatus::Living)],
            )
            .unwrap();
        assert_eq!(provider.get_validators(rollup).unwrap().len(), 2);

        let next = vec![validator(3, 200, ValidatorStatus::Exiting)];
        provider.replace_validators(rollup, &next).unwrap();
        assert_eq!(provider.get_validators(rollup).unwrap(), next);
        assert!(provider.get_validators(Address::ZERO).unwrap().is_empty());
    }
}
