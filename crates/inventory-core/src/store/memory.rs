//! In-process snapshot source.
//!
//! Keeps every written snapshot with its timestamp and serves the most
//! recent one per key, the same contract as the SQLite store.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::errors::InventoryResult;
use crate::store::tags::{TagQuery, TaggedKey};
use crate::store::{collect_tag_values, SnapshotSource};

#[derive(Default)]
struct MemoryState {
    snapshots: IndexMap<String, Vec<(i64, Value)>>,
    tags: IndexMap<String, IndexMap<String, String>>,
}

#[derive(Default)]
pub struct MemorySnapshotSource {
    state: RwLock<MemoryState>,
}

impl MemorySnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `blob` under `key` at `timestamp`. A later call with the same
    /// timestamp replaces the earlier blob.
    pub fn put_snapshot(&self, key: &str, timestamp: i64, blob: Value) {
        let mut state = self.state.write();
        let history = state.snapshots.entry(key.to_string()).or_default();
        match history.iter_mut().find(|(ts, _)| *ts == timestamp) {
            Some(entry) => entry.1 = blob,
            None => history.push((timestamp, blob)),
        }
    }

    /// Replace the tag set of `key`.
    pub fn set_tags<I, K, V>(&self, key: &str, tags: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let tags = tags
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.state.write().tags.insert(key.to_string(), tags);
    }

    pub fn len(&self) -> usize {
        self.state.read().snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn latest(state: &MemoryState, key: &str) -> Option<Value> {
        state
            .snapshots
            .get(key)?
            .iter()
            .max_by_key(|(ts, _)| *ts)
            .map(|(_, blob)| blob.clone())
    }
}

impl SnapshotSource for MemorySnapshotSource {
    fn get_raw(&self, key: &str) -> InventoryResult<Option<Value>> {
        Ok(Self::latest(&self.state.read(), key))
    }

    fn get_raw_batch(&self, keys: &[String]) -> InventoryResult<IndexMap<String, Value>> {
        let state = self.state.read();
        Ok(keys
            .iter()
            .filter_map(|key| Self::latest(&state, key).map(|blob| (key.clone(), blob)))
            .collect())
    }

    fn tag_values(&self, query: &TagQuery) -> InventoryResult<IndexMap<String, Vec<String>>> {
        let matches = self.tagged_keys(query)?;
        Ok(collect_tag_values(query, &matches))
    }

    fn tagged_keys(&self, query: &TagQuery) -> InventoryResult<Vec<TaggedKey>> {
        let state = self.state.read();
        Ok(state
            .tags
            .iter()
            .filter(|(_, tags)| query.matches(tags))
            .map(|(key, tags)| TaggedKey {
                key: key.clone(),
                tags: tags.clone(),
            })
            .collect())
    }
}
