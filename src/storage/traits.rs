//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid timestamp in record {key}: {value}")]
    InvalidTimestamp { key: String, value: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One persisted record
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Serialized state, opaque to the store
    pub payload: Vec<u8>,
    /// Hash of the configuration the record was written under
    pub config_hash: String,
    /// Time of the last write
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Encodes a value as a record stamped with the current time
    pub fn encode<T: Serialize>(value: &T, config_hash: &str) -> StorageResult<Self> {
        Ok(Self {
            payload: serde_json::to_vec(value)?,
            config_hash: config_hash.to_string(),
            updated_at: Utc::now(),
        })
    }

    /// Decodes the payload
    pub fn decode<T: DeserializeOwned>(&self) -> StorageResult<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Age of the record in whole hours
    pub fn age_hours(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated_at).num_hours()
    }
}

/// Trait for checkpoint backends
///
/// Records are keyed by name and overwritten on every save (last writer wins).
pub trait CheckpointStore: Send {
    /// Loads a record, or `None` if it was never written or was deleted
    fn load_record(&self, key: &str) -> StorageResult<Option<StoredRecord>>;

    /// Writes a record, replacing any previous one under the same key
    fn save_record(&mut self, key: &str, record: &StoredRecord) -> StorageResult<()>;

    /// Deletes a record; deleting a missing record is not an error
    fn delete_record(&mut self, key: &str) -> StorageResult<()>;

    /// Deletes the frontier and every handler checkpoint, keeping snapshots
    fn clear_checkpoints(&mut self) -> StorageResult<()>;
}

/// Loads and decodes a record
pub fn load_json<T: DeserializeOwned>(
    store: &dyn CheckpointStore,
    key: &str,
) -> StorageResult<Option<T>> {
    store
        .load_record(key)?
        .map(|record| record.decode())
        .transpose()
}

/// Encodes and saves a value under `key`
pub fn save_json<T: Serialize>(
    store: &mut dyn CheckpointStore,
    key: &str,
    value: &T,
    config_hash: &str,
) -> StorageResult<()> {
    let record = StoredRecord::encode(value, config_hash)?;
    store.save_record(key, &record)
}
