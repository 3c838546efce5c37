//! SQLite codecs for fixed-size chain identifiers.

use alloy_primitives::{Address, B256};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// A 32-byte hash stored as a BLOB.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SqlHash(pub(crate) B256);

impl ToSql for SqlHash {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Blob(self.0.as_slice())))
    }
}

impl FromSql for SqlHash {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let blob = value.as_blob()?;
        if blob.len() != 32 {
            return Err(FromSqlError::InvalidBlobSize { expected_size: 32, blob_size: blob.len() });
        }
        Ok(Self(B256::from_slice(blob)))
    }
}

/// A 20-byte address stored as a BLOB.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SqlAddress(pub(crate) Address);

impl ToSql for SqlAddress {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Blob(self.0.as_slice())))
    }
}

impl FromSql for SqlAddress {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let blob = value.as_blob()?;
        if blob.len() != 20 {
            return Err(FromSqlError::InvalidBlobSize { expected_size: 20, blob_size: blob.len() });
        }
        Ok(Self(Address::from_slice(blob)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_hash_blob_length_is_checked() {
        let conn = Connection::open_in_memory().unwrap();
        let short: Result<SqlHash, _> =
            conn.query_row("SELECT x'0102'", [], |row| row.get(0));
        assert!(short.is_err());

        let hash = B256::repeat_byte(0xab);
        let back: SqlHash = conn.query_row("SELECT ?1", [SqlHash(hash)], |row| row.get(0)).unwrap();
        assert_eq!(back.0, hash);
    }
}
