//! Synthetic snapshot keys.
//!
//! The snapshot store addresses blobs by a flat key derived from a path:
//!
//! ```text
//! /f;feed1/r;server1/r;ds1   ->  inventory.feed1.r.server1.ds1
//! /f;feed1/rt;Datasource     ->  inventory.feed1.rt.Datasource
//! /mt;Heap Used              ->  inventory.mt.Heap Used
//! ```
//!
//! Each id is escaped like a path token and additionally has `.` encoded
//! as `%2E`, so distinct paths never share a key.
//!
//! Metric and data-entity paths map to the key of their resource chain,
//! since both live inside the resource's snapshot. The tenant never takes
//! part in the key.

use crate::path::canonical::CanonicalPath;
use crate::path::escape::escape_id;
use crate::path::segment::SegmentKind;

pub const SNAPSHOT_KEY_PREFIX: &str = "inventory";
pub const SNAPSHOT_KEY_SEPARATOR: char = '.';

/// Key with the default `inventory` prefix.
pub fn to_snapshot_key(path: &CanonicalPath) -> String {
    snapshot_key_with_prefix(path, SNAPSHOT_KEY_PREFIX)
}

/// One key component: an escaped id with the separator encoded.
fn key_component(id: &str) -> String {
    escape_id(id).replace(SNAPSHOT_KEY_SEPARATOR, "%2E")
}

pub fn snapshot_key_with_prefix(path: &CanonicalPath, prefix: &str) -> String {
    let mut parts: Vec<String> = vec![prefix.to_string()];
    if let Some(feed) = path.feed() {
        parts.push(key_component(feed));
    }
    let resources = path.resource_ids();
    if !resources.is_empty() {
        parts.push(SegmentKind::Resource.prefix().to_string());
        parts.extend(resources.into_iter().map(key_component));
    } else if let Some(type_seg) = path.type_segment() {
        parts.push(type_seg.kind.prefix().to_string());
        parts.push(key_component(&type_seg.id));
    }
    let separator = SNAPSHOT_KEY_SEPARATOR.to_string();
    parts.join(separator.as_str())
}
