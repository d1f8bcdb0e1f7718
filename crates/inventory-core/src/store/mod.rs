//! Snapshot sources: the boundary between the engine and blob storage.
//!
//! The engine only ever reads through [`SnapshotSource`]. Blobs arrive
//! already decompressed and JSON-parsed; transport, retries and wire
//! decoding belong to the implementation.

pub mod database;
pub mod memory;
pub mod schema;
pub mod tags;

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::errors::InventoryResult;

pub use database::SnapshotDatabase;
pub use memory::MemorySnapshotSource;
pub use tags::{TagPattern, TagQuery, TaggedKey};

/// Read access to the latest stored snapshot per key.
pub trait SnapshotSource {
    /// Most recent blob stored under `key`, or `None`.
    fn get_raw(&self, key: &str) -> InventoryResult<Option<Value>>;

    /// Most recent blob for each key that has one. Keys without data are
    /// simply absent from the result.
    fn get_raw_batch(&self, keys: &[String]) -> InventoryResult<IndexMap<String, Value>>;

    /// For every tag named in `query`, the distinct values carried by keys
    /// matching the whole query.
    fn tag_values(&self, query: &TagQuery) -> InventoryResult<IndexMap<String, Vec<String>>>;

    /// Keys matching `query`, with all of their tags.
    fn tagged_keys(&self, query: &TagQuery) -> InventoryResult<Vec<TaggedKey>>;
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for &S {
    fn get_raw(&self, key: &str) -> InventoryResult<Option<Value>> {
        (**self).get_raw(key)
    }

    fn get_raw_batch(&self, keys: &[String]) -> InventoryResult<IndexMap<String, Value>> {
        (**self).get_raw_batch(keys)
    }

    fn tag_values(&self, query: &TagQuery) -> InventoryResult<IndexMap<String, Vec<String>>> {
        (**self).tag_values(query)
    }

    fn tagged_keys(&self, query: &TagQuery) -> InventoryResult<Vec<TaggedKey>> {
        (**self).tagged_keys(query)
    }
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for Arc<S> {
    fn get_raw(&self, key: &str) -> InventoryResult<Option<Value>> {
        (**self).get_raw(key)
    }

    fn get_raw_batch(&self, keys: &[String]) -> InventoryResult<IndexMap<String, Value>> {
        (**self).get_raw_batch(keys)
    }

    fn tag_values(&self, query: &TagQuery) -> InventoryResult<IndexMap<String, Vec<String>>> {
        (**self).tag_values(query)
    }

    fn tagged_keys(&self, query: &TagQuery) -> InventoryResult<Vec<TaggedKey>> {
        (**self).tagged_keys(query)
    }
}

/// Shared implementation of [`SnapshotSource::tag_values`] over an
/// already-filtered key list.
pub(crate) fn collect_tag_values(
    query: &TagQuery,
    matches: &[TaggedKey],
) -> IndexMap<String, Vec<String>> {
    let mut out: IndexMap<String, Vec<String>> = IndexMap::new();
    for name in query.tag_names() {
        let mut values: Vec<String> = Vec::new();
        for tagged in matches {
            if let Some(value) = tagged.tags.get(name) {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        if !values.is_empty() {
            out.insert(name.to_string(), values);
        }
    }
    out
}
