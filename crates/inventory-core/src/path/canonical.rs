//! `CanonicalPath`: parsing, serialization, validation and derivation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{InventoryError, InventoryResult};
use crate::path::escape::unescape_id;
use crate::path::key::to_snapshot_key;
use crate::path::segment::{Segment, SegmentKind};

/// An immutable, validated sequence of path segments.
///
/// Legal shapes, in order:
///
/// ```text
/// [t] f r* [m | d]          m / d need at least one resource
/// [t] [f] rt [ot]           type paths carry no resource chain
/// [t] [f] mt
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPath {
    segments: Vec<Segment>,
}

impl CanonicalPath {
    /// Parse `/prefix;id/prefix;id...`.
    pub fn parse(text: &str) -> InventoryResult<Self> {
        let body = text
            .strip_prefix('/')
            .ok_or_else(|| InventoryError::malformed_path(text, "must start with '/'"))?;
        if body.is_empty() {
            return Err(InventoryError::malformed_path(text, "path has no segments"));
        }
        let segments = body
            .split('/')
            .map(|token| parse_token(text, token))
            .collect::<InventoryResult<Vec<_>>>()?;
        Self::from_segments(segments).map_err(|err| match err {
            InventoryError::MalformedPath { reason, .. } => InventoryError::malformed_path(text, reason),
            other => other,
        })
    }

    /// Build a path from already-decoded segments, checking the nesting order.
    pub fn from_segments(segments: Vec<Segment>) -> InventoryResult<Self> {
        if let Err(reason) = validate(&segments) {
            let rendered = render(&segments);
            return Err(InventoryError::malformed_path(&rendered, reason));
        }
        Ok(Self { segments })
    }

    /// `/f;<feed_id>`
    pub fn from_feed(feed_id: &str) -> Self {
        Self {
            segments: vec![Segment::new(SegmentKind::Feed, feed_id)],
        }
    }

    /// `/rt;<type_id>` with no feed.
    pub fn feedless_resource_type(type_id: &str) -> Self {
        Self {
            segments: vec![Segment::new(SegmentKind::ResourceType, type_id)],
        }
    }

    /// `/mt;<type_id>` with no feed.
    pub fn feedless_metric_type(type_id: &str) -> Self {
        Self {
            segments: vec![Segment::new(SegmentKind::MetricType, type_id)],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn last(&self) -> &Segment {
        // Validation rejects empty paths.
        &self.segments[self.segments.len() - 1]
    }

    pub fn last_kind(&self) -> SegmentKind {
        self.last().kind
    }

    pub fn tenant(&self) -> Option<&str> {
        self.find(SegmentKind::Tenant)
    }

    pub fn feed(&self) -> Option<&str> {
        self.find(SegmentKind::Feed)
    }

    /// Ids of the resource chain, root first.
    pub fn resource_ids(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter(|s| s.kind == SegmentKind::Resource)
            .map(|s| s.id.as_str())
            .collect()
    }

    /// The resource-type or metric-type segment of a type path.
    pub fn type_segment(&self) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| matches!(s.kind, SegmentKind::ResourceType | SegmentKind::MetricType))
    }

    /// True when the path addresses a resource (ends in `r;`).
    pub fn is_resource(&self) -> bool {
        self.last_kind() == SegmentKind::Resource
    }

    /// The path truncated to its first resource, which is the unit stored
    /// as one snapshot blob. `None` when there is no resource chain.
    pub fn root_resource(&self) -> Option<CanonicalPath> {
        let pos = self
            .segments
            .iter()
            .position(|s| s.kind == SegmentKind::Resource)?;
        Some(Self {
            segments: self.segments[..=pos].to_vec(),
        })
    }

    /// Resource ids below the root resource, i.e. the navigation chain
    /// inside the root's snapshot.
    pub fn relative_resource_ids(&self) -> Vec<&str> {
        let mut ids = self.resource_ids();
        if !ids.is_empty() {
            ids.remove(0);
        }
        ids
    }

    /// Append one resource segment.
    pub fn down(&self, child_id: &str) -> InventoryResult<Self> {
        if self.last_kind().is_terminal() {
            return Err(InventoryError::TerminalPath(self.to_string()));
        }
        let mut segments = self.segments.clone();
        segments.push(Segment::new(SegmentKind::Resource, child_id));
        Ok(Self { segments })
    }

    /// Drop the last segment.
    pub fn up(&self) -> InventoryResult<Self> {
        let remaining = &self.segments[..self.segments.len() - 1];
        if remaining.iter().all(|s| s.kind == SegmentKind::Tenant) {
            return Err(InventoryError::RootPath(self.to_string()));
        }
        Self::from_segments(remaining.to_vec())
    }

    pub fn to_resource_type(&self, type_id: &str) -> InventoryResult<Self> {
        self.extended(SegmentKind::ResourceType, type_id)
    }

    pub fn to_metric_type(&self, type_id: &str) -> InventoryResult<Self> {
        self.extended(SegmentKind::MetricType, type_id)
    }

    pub fn to_operation_type(&self, op_id: &str) -> InventoryResult<Self> {
        self.extended(SegmentKind::OperationType, op_id)
    }

    pub fn to_metric(&self, metric_id: &str) -> InventoryResult<Self> {
        self.extended(SegmentKind::Metric, metric_id)
    }

    pub fn to_data_entity(&self, data_id: &str) -> InventoryResult<Self> {
        self.extended(SegmentKind::DataEntity, data_id)
    }

    /// Same path with the tenant segment set (or replaced).
    pub fn with_tenant(&self, tenant_id: &str) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.push(Segment::new(SegmentKind::Tenant, tenant_id));
        segments.extend(
            self.segments
                .iter()
                .filter(|s| s.kind != SegmentKind::Tenant)
                .cloned(),
        );
        Self { segments }
    }

    /// See [`to_snapshot_key`].
    pub fn snapshot_key(&self) -> String {
        to_snapshot_key(self)
    }

    fn find(&self, kind: SegmentKind) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.id.as_str())
    }

    fn extended(&self, kind: SegmentKind, id: &str) -> InventoryResult<Self> {
        let mut segments = self.segments.clone();
        segments.push(Segment::new(kind, id));
        Self::from_segments(segments)
    }
}

/// Parse a resource chain relative to a feed, e.g. `r;server1/r;ds1`.
///
/// Used for the relative paths carried in resource-type tags. A leading
/// `/` is tolerated.
pub fn parse_resource_chain(text: &str) -> InventoryResult<Vec<String>> {
    let body = text.strip_prefix('/').unwrap_or(text);
    if body.is_empty() {
        return Err(InventoryError::malformed_path(text, "empty resource chain"));
    }
    body.split('/')
        .map(|token| {
            let seg = parse_token(text, token)?;
            if seg.kind != SegmentKind::Resource {
                return Err(InventoryError::malformed_path(
                    text,
                    format!("expected a resource segment, found '{}'", seg.kind),
                ));
            }
            Ok(seg.id)
        })
        .collect()
}

fn parse_token(text: &str, token: &str) -> InventoryResult<Segment> {
    if token.is_empty() {
        return Err(InventoryError::malformed_path(text, "empty segment"));
    }
    let (prefix, escaped) = token.split_once(';').ok_or_else(|| {
        InventoryError::malformed_path(text, format!("segment '{token}' has no ';' separator"))
    })?;
    let kind = SegmentKind::from_prefix(prefix).ok_or_else(|| {
        InventoryError::malformed_path(text, format!("unknown segment prefix '{prefix}'"))
    })?;
    Ok(Segment::new(kind, unescape_id(escaped)))
}

fn validate(segments: &[Segment]) -> Result<(), String> {
    let mut pos = 0;
    let kind_at = |i: usize| segments.get(i).map(|s| s.kind);

    if kind_at(pos) == Some(SegmentKind::Tenant) {
        pos += 1;
    }
    let has_feed = kind_at(pos) == Some(SegmentKind::Feed);
    if has_feed {
        pos += 1;
    }
    let chain_start = pos;
    while kind_at(pos) == Some(SegmentKind::Resource) {
        pos += 1;
    }
    let chain_len = pos - chain_start;

    let tail: Vec<SegmentKind> = segments[pos..].iter().map(|s| s.kind).collect();
    match tail.as_slice() {
        [] => {
            if !has_feed {
                return Err("path needs a feed or a type segment".to_string());
            }
        }
        [SegmentKind::Metric] | [SegmentKind::DataEntity] => {
            if !has_feed || chain_len == 0 {
                return Err(format!(
                    "'{}' must be owned by a resource under a feed",
                    tail[0]
                ));
            }
        }
        [SegmentKind::ResourceType]
        | [SegmentKind::ResourceType, SegmentKind::OperationType]
        | [SegmentKind::MetricType] => {
            if chain_len > 0 {
                return Err(format!("'{}' cannot follow a resource", tail[0]));
            }
        }
        [first, ..] => {
            return Err(format!(
                "unexpected '{}' segment at position {}",
                first,
                pos + 1
            ));
        }
    }
    Ok(())
}

fn render(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push('/');
        out.push_str(&seg.to_string());
    }
    out
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.segments))
    }
}

impl FromStr for CanonicalPath {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CanonicalPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CanonicalPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
