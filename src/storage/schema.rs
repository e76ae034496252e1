//! Database schema definitions
//!
//! Every checkpoint is one row of a key/value table; the payload is opaque to
//! the database.

/// SQL schema for the checkpoint database
pub const SCHEMA_SQL: &str = r#"
-- Checkpoint and snapshot records
CREATE TABLE IF NOT EXISTS records (
    key TEXT PRIMARY KEY,
    payload BLOB NOT NULL,
    config_hash TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
