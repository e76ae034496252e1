//! Storage module for persisting crawl checkpoints
//!
//! This module handles all database operations for the crawler:
//! - SQLite database initialization and schema management
//! - Frontier and handler checkpoints between invocations of one pass
//! - Snapshots of the last completed pass, used as the diff baseline

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{load_json, save_json, CheckpointStore, StorageError, StorageResult, StoredRecord};

use crate::SpiderError;
use std::path::Path;

/// Frontier state of the pass in progress
pub const FRONTIER_KEY: &str = "frontier";

/// Prefix shared by every handler checkpoint
pub const HANDLER_KEY_PREFIX: &str = "handler.";

/// Image lists gathered by the image-map handler
pub const IMAGEMAP_KEY: &str = "handler.imagemap";

/// Radar counts gathered by the linking handler
pub const LINKING_KEY: &str = "handler.linking";

/// Visited and external sets of the last completed pass
pub const SITEMAP_SNAPSHOT_KEY: &str = "snapshot.sitemap";

/// Radar counts of the last completed pass
pub const RADAR_SNAPSHOT_KEY: &str = "snapshot.radar";

/// Initializes or opens the checkpoint database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized storage
/// * `Err(SpiderError)` - Failed to initialize storage
pub fn open_store(path: &Path) -> Result<SqliteStore, SpiderError> {
    SqliteStore::new(path)
}
