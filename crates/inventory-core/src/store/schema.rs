//! SQLite schema of the snapshot store.
//!
//! The layout has a single version. Opening a file written by a newer
//! layout is refused rather than guessed at.

use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::{InventoryError, InventoryResult};

pub const SCHEMA_VERSION: i32 = 1;

/// Idempotent DDL, replayed on every [`apply_schema`].
pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS snapshots (
        key TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        blob TEXT NOT NULL,
        PRIMARY KEY(key, timestamp)
    );",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_key_ts ON snapshots(key, timestamp DESC);",
    "CREATE TABLE IF NOT EXISTS snapshot_tags (
        key TEXT NOT NULL,
        name TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY(key, name)
    );",
    "CREATE INDEX IF NOT EXISTS idx_snapshot_tags_name_value ON snapshot_tags(name, value);",
];

const VERSION_KEY: &str = "schema_version";

/// Create missing tables and indexes and stamp [`SCHEMA_VERSION`], all in
/// one transaction.
pub fn apply_schema(conn: &mut Connection) -> InventoryResult<()> {
    let tx = conn.transaction()?;
    for stmt in SCHEMA_STATEMENTS {
        tx.execute_batch(stmt)?;
    }
    match stored_version(&tx)? {
        Some(found) if found > SCHEMA_VERSION => {
            return Err(InventoryError::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        Some(found) if found == SCHEMA_VERSION => {}
        _ => {
            tx.execute(
                "INSERT INTO store_meta(key, value) VALUES(?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
                params![VERSION_KEY, SCHEMA_VERSION.to_string()],
            )?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Version stamped in `store_meta`; `None` before the first
/// [`apply_schema`]. An unparseable stamp counts as absent.
pub fn stored_version(conn: &Connection) -> InventoryResult<Option<i32>> {
    let text: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = ?1;",
            params![VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(text.and_then(|v| v.parse().ok()))
}
