//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CheckpointStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult, StoredRecord};
use crate::storage::{FRONTIER_KEY, HANDLER_KEY_PREFIX};
use crate::SpiderError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite checkpoint backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the checkpoint database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(SpiderError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SpiderError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, SpiderError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl CheckpointStore for SqliteStore {
    fn load_record(&self, key: &str) -> StorageResult<Option<StoredRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload, config_hash, updated_at FROM records WHERE key = ?1")?;

        let row = stmt
            .query_row(params![key], |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .optional()?;

        let Some((payload, config_hash, updated_at)) = row else {
            return Ok(None);
        };

        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| StorageError::InvalidTimestamp {
                key: key.to_string(),
                value: updated_at.clone(),
            })?;

        Ok(Some(StoredRecord {
            payload,
            config_hash,
            updated_at,
        }))
    }

    fn save_record(&mut self, key: &str, record: &StoredRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO records (key, payload, config_hash, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                config_hash = excluded.config_hash,
                updated_at = excluded.updated_at",
            params![
                key,
                record.payload,
                record.config_hash,
                record.updated_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn delete_record(&mut self, key: &str) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM records WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn clear_checkpoints(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM records WHERE key = ?1", params![FRONTIER_KEY])?;
        tx.execute(
            "DELETE FROM records WHERE key LIKE ?1",
            params![format!("{}%", HANDLER_KEY_PREFIX)],
        )?;
        tx.commit()?;
        Ok(())
    }
}
