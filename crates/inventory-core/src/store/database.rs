//! SQLite-backed snapshot store.
//!
//! Holds timestamped JSON blobs and their tags, a local mirror of the
//! remote time-series store. Each public method opens its own connection
//! so callers never manage connection lifetime.

use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::{InventoryError, InventoryResult};
use crate::store::schema;
use crate::store::tags::{TagQuery, TaggedKey};
use crate::store::{collect_tag_values, SnapshotSource};

/// Expand a leading `~` component to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let mut components = path.components();
    if let Some(Component::Normal(first)) = components.next() {
        if first == "~" {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home).join(components.as_path());
            }
        }
    }
    path.to_path_buf()
}

#[cfg_attr(feature = "python", pyo3::pyclass)]
pub struct SnapshotDatabase {
    db_path: PathBuf,
}

impl SnapshotDatabase {
    /// Resolve `db_path` (tilde-expanded, made absolute) and create its
    /// parent directories. The schema is not touched until
    /// [`SnapshotDatabase::init_schema`].
    pub fn new(db_path: impl AsRef<Path>) -> InventoryResult<Self> {
        let expanded = expand_tilde(db_path.as_ref());
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(&expanded)
        };
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { db_path: resolved })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> InventoryResult<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// Enable WAL and create or verify the schema.
    pub fn init_schema(&self) -> InventoryResult<()> {
        let mut conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        schema::apply_schema(&mut conn)?;
        info!(
            "snapshot store ready at {} (schema v{})",
            self.db_path.display(),
            schema::SCHEMA_VERSION
        );
        Ok(())
    }

    /// Store one snapshot; an existing blob with the same key and
    /// timestamp is replaced.
    pub fn put_snapshot(&self, key: &str, timestamp: i64, blob: &Value) -> InventoryResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO snapshots(key, timestamp, blob) VALUES(?1, ?2, ?3) \
             ON CONFLICT(key, timestamp) DO UPDATE SET blob = excluded.blob;",
            params![key, timestamp, serde_json::to_string(blob)?],
        )?;
        Ok(())
    }

    /// Replace the tag set of `key`.
    pub fn set_tags(&self, key: &str, tags: &IndexMap<String, String>) -> InventoryResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM snapshot_tags WHERE key = ?1;", params![key])?;
        for (name, value) in tags {
            tx.execute(
                "INSERT INTO snapshot_tags(key, name, value) VALUES(?1, ?2, ?3);",
                params![key, name, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete snapshots older than `before`, always keeping the latest one
    /// per key.
    pub fn prune_before(&self, before: i64) -> InventoryResult<usize> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM snapshots WHERE timestamp < ?1 AND timestamp < \
             (SELECT MAX(s2.timestamp) FROM snapshots s2 WHERE s2.key = snapshots.key);",
            params![before],
        )?;
        Ok(removed)
    }

    fn latest(conn: &Connection, key: &str) -> InventoryResult<Option<Value>> {
        let text: Option<String> = conn
            .query_row(
                "SELECT blob FROM snapshots WHERE key = ?1 \
                 ORDER BY timestamp DESC LIMIT 1;",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match text {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| InventoryError::MalformedSnapshot {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn all_tags(conn: &Connection) -> InventoryResult<IndexMap<String, IndexMap<String, String>>> {
        let mut stmt = conn.prepare(
            "SELECT key, name, value FROM snapshot_tags ORDER BY key ASC, name ASC;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut grouped: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
        for row in rows {
            let (key, name, value) = row?;
            grouped.entry(key).or_default().insert(name, value);
        }
        Ok(grouped)
    }
}

impl SnapshotSource for SnapshotDatabase {
    fn get_raw(&self, key: &str) -> InventoryResult<Option<Value>> {
        let conn = self.connect()?;
        Self::latest(&conn, key)
    }

    fn get_raw_batch(&self, keys: &[String]) -> InventoryResult<IndexMap<String, Value>> {
        let conn = self.connect()?;
        let mut out = IndexMap::new();
        for key in keys {
            match Self::latest(&conn, key) {
                Ok(Some(blob)) => {
                    out.insert(key.clone(), blob);
                }
                Ok(None) => {}
                Err(InventoryError::MalformedSnapshot { key, reason }) => {
                    warn!("skipping undecodable snapshot {key}: {reason}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    fn tag_values(&self, query: &TagQuery) -> InventoryResult<IndexMap<String, Vec<String>>> {
        let matches = self.tagged_keys(query)?;
        Ok(collect_tag_values(query, &matches))
    }

    fn tagged_keys(&self, query: &TagQuery) -> InventoryResult<Vec<TaggedKey>> {
        let conn = self.connect()?;
        Ok(Self::all_tags(&conn)?
            .into_iter()
            .filter(|(_, tags)| query.matches(tags))
            .map(|(key, tags)| TaggedKey { key, tags })
            .collect())
    }
}
