//! End-to-end queries over both snapshot sources, using one fixture
//! inventory:
//!
//! ```text
//! feed1
//!   server1 (Server)          config {"x": 1}, metrics heap / threads / orphan
//!     ds1 (Datasource)
//!     ds2 (Datasource)
//!       pool1
//!   server2 (Server)
//!     cfg/main
//! feed2
//!   lonely
//! ```

use indexmap::IndexMap;
use serde_json::{json, Value};

use inventory_core::store::{MemorySnapshotSource, SnapshotDatabase, SnapshotSource};
use inventory_core::{
    CanonicalPath, EntityFilter, InventoryClient, InventoryConfig, InventoryEntity, InventoryError,
};

struct Entry {
    key: &'static str,
    blob: Value,
    tags: Vec<(&'static str, &'static str)>,
}

fn fixture() -> Vec<Entry> {
    vec![
        Entry {
            key: "inventory.feed1.rt.Server",
            blob: json!({"data": {"id": "Server", "name": "Application Server"}}),
            tags: vec![("module", "inventory"), ("feed", "feed1"), ("type", "rt")],
        },
        Entry {
            key: "inventory.feed1.rt.Datasource",
            blob: json!({"data": {"id": "Datasource"}}),
            tags: vec![("module", "inventory"), ("feed", "feed1"), ("type", "rt")],
        },
        Entry {
            key: "inventory.feed1.mt.Heap",
            blob: json!({"data": {"id": "Heap", "unit": "BYTES", "type": "GAUGE"}}),
            tags: vec![("module", "inventory"), ("feed", "feed1"), ("type", "mt")],
        },
        Entry {
            key: "inventory.feed1.r.server1",
            blob: json!({
                "data": {
                    "id": "server1",
                    "resourceTypePath": "/f;feed1/rt;Server",
                    "properties": {"y": 2}
                },
                "children": {
                    "resource": [
                        {"data": {"id": "ds1", "resourceTypePath": "/f;feed1/rt;Datasource"}},
                        {
                            "data": {"id": "ds2", "resourceTypePath": "/f;feed1/rt;Datasource"},
                            "children": {"resource": [{"data": {"id": "pool1"}}]}
                        }
                    ],
                    "metric": [
                        {"data": {"id": "heap", "metricTypePath": "/f;feed1/mt;Heap", "properties": {"interval": 30}}},
                        {"data": {"id": "threads", "metricTypePath": "/f;feed1/mt;Threads"}},
                        {"data": {"id": "orphan"}}
                    ],
                    "dataEntity": [
                        {"data": {"id": "configuration", "value": {"x": 1}}}
                    ]
                }
            }),
            tags: vec![
                ("module", "inventory"),
                ("feed", "feed1"),
                ("type", "r"),
                ("rt.Server", "r;server1"),
                ("rt.Datasource", "r;server1/r;ds1,r;server1/r;ds2"),
            ],
        },
        Entry {
            key: "inventory.feed1.r.server2",
            blob: json!({
                "data": {"id": "server2", "resourceTypePath": "/f;feed1/rt;Server"},
                "children": {"resource": [{"data": {"id": "cfg%2Fmain"}}]}
            }),
            tags: vec![
                ("module", "inventory"),
                ("feed", "feed1"),
                ("type", "r"),
                ("rt.Server", "r;server2"),
            ],
        },
        Entry {
            key: "inventory.feed2.r.lonely",
            blob: json!({"data": {"id": "lonely"}}),
            tags: vec![("module", "inventory"), ("feed", "feed2"), ("type", "r")],
        },
    ]
}

fn memory_client() -> InventoryClient<MemorySnapshotSource> {
    let source = MemorySnapshotSource::new();
    for entry in fixture() {
        source.put_snapshot(entry.key, 1, entry.blob);
        source.set_tags(entry.key, entry.tags);
    }
    InventoryClient::new(source, InventoryConfig::default())
}

fn database_client() -> (tempfile::TempDir, InventoryClient<SnapshotDatabase>) {
    let dir = tempfile::tempdir().unwrap();
    let db = SnapshotDatabase::new(dir.path().join("inventory.db")).unwrap();
    db.init_schema().unwrap();
    for entry in fixture() {
        db.put_snapshot(entry.key, 1, &entry.blob).unwrap();
        let tags: IndexMap<String, String> = entry
            .tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        db.set_tags(entry.key, &tags).unwrap();
    }
    (dir, InventoryClient::new(db, InventoryConfig::default()))
}

fn path(text: &str) -> CanonicalPath {
    CanonicalPath::parse(text).unwrap()
}

fn ids<E: InventoryEntity>(items: &[E]) -> Vec<&str> {
    items.iter().map(|e| e.id()).collect()
}

/// Runs a generic check against the in-memory and the SQLite-backed client.
macro_rules! on_both_sources {
    ($check:ident) => {{
        $check(&memory_client());
        let (_dir, database) = database_client();
        $check(&database);
    }};
}

// ---------------------------------------------------------------------------
// Feeds and types
// ---------------------------------------------------------------------------

fn check_list_feeds<S: SnapshotSource>(client: &InventoryClient<S>) {
    assert_eq!(client.list_feeds().unwrap(), vec!["feed1", "feed2"]);
}

#[test]
fn test_list_feeds() {
    on_both_sources!(check_list_feeds);
}

fn check_list_resource_types<S: SnapshotSource>(client: &InventoryClient<S>) {
    let mut types = client.list_resource_types(Some("feed1")).unwrap();
    types.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(ids(&types), vec!["Datasource", "Server"]);
    assert_eq!(types[1].path.to_string(), "/f;feed1/rt;Server");
    assert_eq!(types[1].name.as_deref(), Some("Application Server"));

    assert!(client.list_resource_types(Some("feed2")).unwrap().is_empty());
    assert!(client.list_resource_types(Some("nope")).unwrap().is_empty());
}

#[test]
fn test_list_resource_types() {
    on_both_sources!(check_list_resource_types);
}

#[test]
fn test_resource_types_require_feed() {
    let client = memory_client();
    let err = client.list_resource_types(None).unwrap_err();
    assert!(matches!(err, InventoryError::MissingFeed(_)));
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

fn check_resources_for_feed<S: SnapshotSource>(client: &InventoryClient<S>) {
    let all = client
        .list_resources_for_feed(Some("feed1"), false, &EntityFilter::new())
        .unwrap();
    assert_eq!(ids(&all), vec!["server1", "server2"]);
    assert_eq!(all[0].type_id.as_deref(), Some("Server"));
    assert_eq!(all[0].properties, *json!({"y": 2}).as_object().unwrap());

    let filter = EntityFilter::new().with_kind("resource").with_id_match("2");
    let some = client
        .list_resources_for_feed(Some("feed1"), true, &filter)
        .unwrap();
    assert_eq!(ids(&some), vec!["server2"]);
}

#[test]
fn test_list_resources_for_feed_with_filter() {
    on_both_sources!(check_resources_for_feed);
}

fn check_resources_for_type<S: SnapshotSource>(client: &InventoryClient<S>) {
    let datasources = client
        .list_resources_for_type(&path("/f;feed1/rt;Datasource"), false)
        .unwrap();
    let paths: Vec<String> = datasources.iter().map(|r| r.path.to_string()).collect();
    assert_eq!(
        paths,
        vec!["/f;feed1/r;server1/r;ds1", "/f;feed1/r;server1/r;ds2"]
    );
    assert!(datasources
        .iter()
        .all(|r| r.type_id.as_deref() == Some("Datasource")));

    let servers = client
        .list_resources_for_type(&path("/f;feed1/rt;Server"), true)
        .unwrap();
    assert_eq!(ids(&servers), vec!["server1", "server2"]);
    assert_eq!(servers[0].properties, *json!({"y": 2, "x": 1}).as_object().unwrap());

    let none = client
        .list_resources_for_type(&path("/f;feed1/rt;Queue"), false)
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_list_resources_for_type_follows_relative_paths() {
    on_both_sources!(check_resources_for_type);
}

fn check_child_resources<S: SnapshotSource>(client: &InventoryClient<S>) {
    let direct = client
        .list_child_resources(&path("/f;feed1/r;server1"), false)
        .unwrap();
    assert_eq!(ids(&direct), vec!["ds1", "ds2"]);
    assert_eq!(direct[0].path.to_string(), "/f;feed1/r;server1/r;ds1");

    let all = client
        .list_child_resources(&path("/f;feed1/r;server1"), true)
        .unwrap();
    assert_eq!(ids(&all), vec!["ds1", "ds2", "pool1"]);
    assert_eq!(all[2].path.to_string(), "/f;feed1/r;server1/r;ds2/r;pool1");

    let whole_feed = client
        .list_child_resources(&path("/f;feed1"), true)
        .unwrap();
    assert_eq!(
        ids(&whole_feed),
        vec!["server1", "ds1", "ds2", "pool1", "server2", "cfg/main"]
    );

    let leaf = client
        .list_child_resources(&path("/f;feed1/r;server1/r;ds1"), true)
        .unwrap();
    assert!(leaf.is_empty());
}

#[test]
fn test_list_child_resources() {
    on_both_sources!(check_child_resources);
}

#[test]
fn test_child_resources_require_feed() {
    let client = memory_client();
    let err = client
        .list_child_resources(&path("/rt;Server"), false)
        .unwrap_err();
    assert!(matches!(err, InventoryError::MissingFeed(_)));
}

fn check_get_resource<S: SnapshotSource>(client: &InventoryClient<S>) {
    let pool = client
        .get_resource(&path("/f;feed1/r;server1/r;ds2/r;pool1"), false)
        .unwrap()
        .unwrap();
    assert_eq!(pool.id, "pool1");
    assert_eq!(pool.type_id, None);

    let escaped = client
        .get_resource(&path("/f;feed1/r;server2/r;cfg%2Fmain"), false)
        .unwrap()
        .unwrap();
    assert_eq!(escaped.id, "cfg/main");
    assert_eq!(escaped.path.to_string(), "/f;feed1/r;server2/r;cfg%2Fmain");

    let missing = client
        .get_resource(&path("/f;feed1/r;server1/r;ds9"), false)
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn test_get_resource_deep_and_escaped() {
    on_both_sources!(check_get_resource);
}

fn check_config_data<S: SnapshotSource>(client: &InventoryClient<S>) {
    let config = client
        .get_config_data_for_resource(&path("/f;feed1/r;server1"))
        .unwrap();
    assert_eq!(config, Some(json!({"x": 1}).as_object().unwrap().clone()));

    let none = client
        .get_config_data_for_resource(&path("/f;feed1/r;server1/r;ds1"))
        .unwrap();
    assert_eq!(none, None);
}

#[test]
fn test_get_config_data_for_resource() {
    on_both_sources!(check_config_data);
}

#[test]
fn test_resource_operations_reject_non_resource_paths() {
    let client = memory_client();
    let err = client
        .get_resource(&path("/f;feed1/r;server1/m;heap"), false)
        .unwrap_err();
    assert!(matches!(err, InventoryError::MalformedPath { .. }));
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

fn check_metrics<S: SnapshotSource>(client: &InventoryClient<S>) {
    let metrics = client
        .list_metrics_for_resource(&path("/f;feed1/r;server1"), &EntityFilter::new())
        .unwrap();
    assert_eq!(ids(&metrics), vec!["heap"]);
    let heap = &metrics[0];
    assert_eq!(heap.path.to_string(), "/f;feed1/r;server1/m;heap");
    assert_eq!(heap.metric_type.id, "Heap");
    assert_eq!(heap.metric_type.properties.get("unit"), Some(&json!("BYTES")));
    assert_eq!(heap.properties.get("interval"), Some(&json!(30)));

    assert!(client
        .list_metrics_for_resource(&path("/f;feed1/r;server2"), &EntityFilter::new())
        .unwrap()
        .is_empty());
    assert!(client
        .list_metrics_for_resource(
            &path("/f;feed1/r;server1"),
            &EntityFilter::new().with_kind("resource"),
        )
        .unwrap()
        .is_empty());
}

#[test]
fn test_unresolvable_metric_types_are_dropped() {
    on_both_sources!(check_metrics);
}

// ---------------------------------------------------------------------------
// Snapshot history and configuration
// ---------------------------------------------------------------------------

#[test]
fn test_newest_snapshot_wins() {
    let source = MemorySnapshotSource::new();
    source.put_snapshot(
        "inventory.feed1.r.server1",
        5,
        json!({"data": {"id": "server1", "name": "new"}}),
    );
    source.put_snapshot(
        "inventory.feed1.r.server1",
        1,
        json!({"data": {"id": "server1", "name": "old"}}),
    );
    let client = InventoryClient::new(&source, InventoryConfig::default());
    let resource = client
        .get_resource(&path("/f;feed1/r;server1"), false)
        .unwrap()
        .unwrap();
    assert_eq!(resource.name.as_deref(), Some("new"));
}

#[test]
fn test_custom_key_prefix() {
    let source = MemorySnapshotSource::new();
    source.put_snapshot("hawkular.feed1.r.server1", 1, json!({"data": {"id": "server1"}}));
    let config = InventoryConfig::from_json_str(r#"{"key_prefix": "hawkular"}"#).unwrap();
    let client = InventoryClient::new(&source, config);
    assert!(client
        .get_resource(&path("/f;feed1/r;server1"), false)
        .unwrap()
        .is_some());
}

#[test]
fn test_resources_without_id_do_not_hide_their_siblings() {
    let source = MemorySnapshotSource::new();
    source.put_snapshot(
        "inventory.feed1.r.good",
        1,
        json!({
            "data": {"id": "good"},
            "children": {"resource": [
                {"data": {"id": ""}, "children": {"resource": [{"data": {"id": "hidden"}}]}},
                {"data": {"id": "ds1", "resourceTypePath": "/f;feed1/rt;Datasource"}}
            ]}
        }),
    );
    source.set_tags(
        "inventory.feed1.r.good",
        [
            ("module", "inventory"),
            ("feed", "feed1"),
            ("type", "r"),
            ("rt.Datasource", "r;good/r;,r;good/r;ds1"),
        ],
    );
    source.put_snapshot("inventory.feed1.r.", 1, json!({"data": {"id": ""}}));
    source.set_tags(
        "inventory.feed1.r.",
        [
            ("module", "inventory"),
            ("feed", "feed1"),
            ("type", "r"),
            ("rt.Datasource", "r;"),
        ],
    );
    let client = InventoryClient::new(&source, InventoryConfig::default());

    let roots = client
        .list_resources_for_feed(Some("feed1"), false, &EntityFilter::new())
        .unwrap();
    assert_eq!(ids(&roots), vec!["good"]);

    let whole_feed = client.list_child_resources(&path("/f;feed1"), true).unwrap();
    assert_eq!(ids(&whole_feed), vec!["good", "ds1"]);

    let children = client
        .list_child_resources(&path("/f;feed1/r;good"), false)
        .unwrap();
    assert_eq!(ids(&children), vec!["ds1"]);

    let typed = client
        .list_resources_for_type(&path("/f;feed1/rt;Datasource"), false)
        .unwrap();
    assert_eq!(ids(&typed), vec!["ds1"]);
}
