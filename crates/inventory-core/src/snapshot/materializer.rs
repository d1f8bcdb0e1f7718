//! Conversion of raw snapshot sub-trees into path-stamped entity records.

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::InventoryResult;
use crate::models::{Metric, MetricType, Properties, METRIC_TYPE_PATH_FIELD};
use crate::path::{snapshot_key_with_prefix, CanonicalPath, SegmentKind};
use crate::snapshot::raw::RawSnapshot;

/// Reserved data-entity id carrying runtime property overrides.
pub const CONFIGURATION_ID: &str = "configuration";

/// A snapshot's `data` object stamped with its canonical path.
///
/// `data` holds the unescaped `id`, every stored data field, and a
/// `path` string; it never carries `children`.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityRecord {
    pub path: CanonicalPath,
    pub data: Map<String, Value>,
}

impl EntityRecord {
    pub fn new(path: CanonicalPath, data: Map<String, Value>) -> Self {
        Self { path, data }
    }

    pub fn id(&self) -> &str {
        self.data.get("id").and_then(Value::as_str).unwrap_or("")
    }

    pub fn str_field(&self, name: &str) -> Option<String> {
        self.data.get(name).and_then(Value::as_str).map(str::to_string)
    }

    pub fn properties(&self) -> Properties {
        self.data
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.data)
    }
}

/// Stamp `raw.data` with `path_for(id)` and, when `fetch_properties` is set,
/// overlay the configuration data entity's value onto `properties`.
pub fn materialize<F>(
    raw: &RawSnapshot,
    path_for: F,
    fetch_properties: bool,
) -> InventoryResult<EntityRecord>
where
    F: FnOnce(&str) -> InventoryResult<CanonicalPath>,
{
    let id = raw.id();
    let path = path_for(&id)?;

    let mut data = raw.data.fields.clone();
    data.insert("id".to_string(), Value::String(id));
    data.insert("path".to_string(), Value::String(path.to_string()));

    if fetch_properties {
        if let Some(config) = configuration_value(raw) {
            let mut properties = raw.properties().cloned().unwrap_or_default();
            for (key, value) in config {
                properties.insert(key.clone(), value.clone());
            }
            data.insert("properties".to_string(), Value::Object(properties));
        }
    }

    Ok(EntityRecord::new(path, data))
}

/// The `value` object of the first `configuration` data entity, if any.
pub fn configuration_value(raw: &RawSnapshot) -> Option<&Map<String, Value>> {
    let entry = raw
        .child_data_entities()
        .iter()
        .find(|d| d.id() == CONFIGURATION_ID)?;
    match entry.value() {
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            debug!("configuration of '{}' is not an object: {other}", raw.id());
            None
        }
        None => None,
    }
}

/// Child resources of `raw` as records under `parent`.
///
/// Properties are never merged here. With `recursive`, every descendant
/// level is included, in depth-first pre-order.
pub fn materialize_children(
    raw: &RawSnapshot,
    parent: &CanonicalPath,
    recursive: bool,
) -> InventoryResult<Vec<EntityRecord>> {
    let mut out = Vec::new();
    collect_children(raw, parent, recursive, &mut out)?;
    Ok(out)
}

fn collect_children(
    raw: &RawSnapshot,
    parent: &CanonicalPath,
    recursive: bool,
    out: &mut Vec<EntityRecord>,
) -> InventoryResult<()> {
    for child in raw.child_resources() {
        if child.id().is_empty() {
            warn!("skipping child resource of {parent} without an id");
            continue;
        }
        let record = materialize(child, |id| parent.down(id), false)?;
        let child_path = record.path.clone();
        out.push(record);
        if recursive {
            collect_children(child, &child_path, true, out)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// A metric record waiting for its type to be fetched.
#[derive(Clone, Debug)]
pub struct PendingMetric {
    pub record: EntityRecord,
    pub type_path: Option<CanonicalPath>,
}

impl PendingMetric {
    pub fn type_key(&self, key_prefix: &str) -> Option<String> {
        self.type_path
            .as_ref()
            .map(|path| snapshot_key_with_prefix(path, key_prefix))
    }
}

/// First pass: materialize every `children.metric` entry of a resource and
/// read its declared metric-type path.
pub fn collect_metrics(
    raw: &RawSnapshot,
    resource_path: &CanonicalPath,
) -> InventoryResult<Vec<PendingMetric>> {
    let mut pending = Vec::with_capacity(raw.child_metrics().len());
    for entry in raw.child_metrics() {
        let record = materialize(entry, |id| resource_path.to_metric(id), false)?;
        let type_path = record
            .str_field(METRIC_TYPE_PATH_FIELD)
            .and_then(|text| match CanonicalPath::parse(&text) {
                Ok(path) if path.last_kind() == SegmentKind::MetricType => Some(path),
                Ok(path) => {
                    debug!("metric {} references non-metric-type path {path}", record.path);
                    None
                }
                Err(err) => {
                    debug!("metric {} has an unusable type reference: {err}", record.path);
                    None
                }
            });
        pending.push(PendingMetric { record, type_path });
    }
    Ok(pending)
}

/// Distinct metric-type snapshot keys, in first-seen order.
pub fn metric_type_keys(pending: &[PendingMetric], key_prefix: &str) -> Vec<String> {
    pending
        .iter()
        .filter_map(|item| item.type_key(key_prefix))
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Second pass: pair each metric with its fetched type. Metrics whose type
/// blob is missing or undecodable are dropped.
pub fn resolve_metrics(
    pending: Vec<PendingMetric>,
    types: &IndexMap<String, Value>,
    key_prefix: &str,
) -> Vec<Metric> {
    let mut metrics = Vec::with_capacity(pending.len());
    for item in pending {
        let Some(type_path) = item.type_path.clone() else {
            continue;
        };
        let key = snapshot_key_with_prefix(&type_path, key_prefix);
        let Some(blob) = types.get(&key) else {
            debug!("dropping metric {}: type {type_path} not found", item.record.path);
            continue;
        };
        let resolved = RawSnapshot::from_value(&key, blob.clone())
            .and_then(|raw| materialize(&raw, |_| Ok(type_path.clone()), false))
            .and_then(MetricType::from_record)
            .and_then(|metric_type| Metric::from_record(item.record, metric_type));
        match resolved {
            Ok(metric) => metrics.push(metric),
            Err(err) => warn!("dropping metric with unusable type {type_path}: {err}"),
        }
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::SNAPSHOT_KEY_PREFIX;
    use serde_json::json;

    fn raw(value: Value) -> RawSnapshot {
        RawSnapshot::from_value("k", value).unwrap()
    }

    fn path(text: &str) -> CanonicalPath {
        CanonicalPath::parse(text).unwrap()
    }

    #[test]
    fn test_configuration_overrides_properties() {
        let snapshot = raw(json!({
            "data": {"id": "server1", "properties": {"y": 2, "x": 0}},
            "children": {"dataEntity": [
                {"data": {"id": "other", "value": {"z": 3}}},
                {"data": {"id": "configuration", "value": {"x": 1}}}
            ]}
        }));
        let base = path("/f;feed1");
        let record = materialize(&snapshot, |id| base.down(id), true).unwrap();
        assert_eq!(record.properties(), json!({"y": 2, "x": 1}).as_object().cloned().unwrap());
        assert_eq!(record.path.to_string(), "/f;feed1/r;server1");
    }

    #[test]
    fn test_configuration_without_own_properties() {
        let snapshot = raw(json!({
            "data": {"id": "a"},
            "children": {"dataEntity": [{"data": {"id": "configuration", "value": {"x": 1}}}]}
        }));
        let base = path("/f;feed1");
        let record = materialize(&snapshot, |id| base.down(id), true).unwrap();
        assert_eq!(record.data.get("properties"), Some(&json!({"x": 1})));
    }

    #[test]
    fn test_degenerate_record_is_data_plus_path() {
        let snapshot = raw(json!({"data": {"id": "a", "name": "A", "properties": {"k": "v"}}}));
        let base = path("/f;feed1");
        for fetch in [false, true] {
            let record = materialize(&snapshot, |id| base.down(id), fetch).unwrap();
            assert_eq!(
                record.into_json(),
                json!({"id": "a", "name": "A", "properties": {"k": "v"}, "path": "/f;feed1/r;a"})
            );
        }
    }

    #[test]
    fn test_properties_not_merged_unless_requested() {
        let snapshot = raw(json!({
            "data": {"id": "a", "properties": {"y": 2}},
            "children": {"dataEntity": [{"data": {"id": "configuration", "value": {"x": 1}}}]}
        }));
        let base = path("/f;feed1");
        let record = materialize(&snapshot, |id| base.down(id), false).unwrap();
        assert_eq!(record.data.get("properties"), Some(&json!({"y": 2})));
        assert!(!record.data.contains_key("children"));
    }

    #[test]
    fn test_children_one_level_and_recursive() {
        let snapshot = raw(json!({
            "data": {"id": "server1"},
            "children": {"resource": [
                {"data": {"id": "ds1"}, "children": {"resource": [{"data": {"id": "pool"}}]}},
                {"data": {"id": "ds2"}}
            ]}
        }));
        let parent = path("/f;feed1/r;server1");

        let flat = materialize_children(&snapshot, &parent, false).unwrap();
        let paths: Vec<String> = flat.iter().map(|r| r.path.to_string()).collect();
        assert_eq!(paths, vec!["/f;feed1/r;server1/r;ds1", "/f;feed1/r;server1/r;ds2"]);

        let deep = materialize_children(&snapshot, &parent, true).unwrap();
        let paths: Vec<String> = deep.iter().map(|r| r.path.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "/f;feed1/r;server1/r;ds1",
                "/f;feed1/r;server1/r;ds1/r;pool",
                "/f;feed1/r;server1/r;ds2",
            ]
        );
    }

    #[test]
    fn test_children_without_id_are_skipped_with_their_subtree() {
        let snapshot = raw(json!({
            "data": {"id": "server1"},
            "children": {"resource": [
                {"data": {"id": ""}, "children": {"resource": [{"data": {"id": "hidden"}}]}},
                {"data": {"id": "ds1"}}
            ]}
        }));
        let records = materialize_children(&snapshot, &path("/f;feed1/r;server1"), true).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["ds1"]);
    }

    #[test]
    fn test_children_never_merge_configuration() {
        let snapshot = raw(json!({
            "data": {"id": "server1"},
            "children": {"resource": [{
                "data": {"id": "ds1", "properties": {"a": 1}},
                "children": {"dataEntity": [{"data": {"id": "configuration", "value": {"b": 2}}}]}
            }]}
        }));
        let records = materialize_children(&snapshot, &path("/f;feed1/r;server1"), false).unwrap();
        assert_eq!(records[0].data.get("properties"), Some(&json!({"a": 1})));
    }

    #[test]
    fn test_metrics_two_pass_drops_unresolved() {
        let snapshot = raw(json!({
            "data": {"id": "server1"},
            "children": {"metric": [
                {"data": {"id": "heap", "metricTypePath": "/f;feed1/mt;Heap Used"}},
                {"data": {"id": "nonheap", "metricTypePath": "/f;feed1/mt;Heap Used"}},
                {"data": {"id": "threads", "metricTypePath": "/f;feed1/mt;Missing"}},
                {"data": {"id": "untyped"}}
            ]}
        }));
        let resource = path("/f;feed1/r;server1");
        let pending = collect_metrics(&snapshot, &resource).unwrap();
        assert_eq!(pending.len(), 4);

        let keys = metric_type_keys(&pending, SNAPSHOT_KEY_PREFIX);
        assert_eq!(keys, vec!["inventory.feed1.mt.Heap Used", "inventory.feed1.mt.Missing"]);

        let mut types = IndexMap::new();
        types.insert(
            "inventory.feed1.mt.Heap Used".to_string(),
            json!({"data": {"id": "Heap Used", "type": "GAUGE", "unit": "BYTES"}}),
        );
        let metrics = resolve_metrics(pending, &types, SNAPSHOT_KEY_PREFIX);
        let ids: Vec<&str> = metrics.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["heap", "nonheap"]);
        assert_eq!(metrics[0].path.to_string(), "/f;feed1/r;server1/m;heap");
        assert_eq!(metrics[0].metric_type.properties.get("unit"), Some(&json!("BYTES")));
    }

    #[test]
    fn test_undecodable_metric_type_is_dropped() {
        let snapshot = raw(json!({
            "data": {"id": "server1"},
            "children": {"metric": [{"data": {"id": "heap", "metricTypePath": "/mt;Heap"}}]}
        }));
        let pending = collect_metrics(&snapshot, &path("/f;feed1/r;server1")).unwrap();
        let mut types = IndexMap::new();
        types.insert("inventory.mt.Heap".to_string(), json!({"unexpected": true}));
        assert!(resolve_metrics(pending, &types, SNAPSHOT_KEY_PREFIX).is_empty());
    }
}
