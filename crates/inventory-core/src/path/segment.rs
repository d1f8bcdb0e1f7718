//! Path segment kinds and their wire prefixes.

use std::fmt;

/// The kind of one canonical path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// `t`: informational, only ever first.
    Tenant,
    /// `f`: the discovery agent that reported everything below it.
    Feed,
    /// `r`: one level of the resource chain.
    Resource,
    /// `rt`
    ResourceType,
    /// `mt`
    MetricType,
    /// `ot`: only directly below a resource type.
    OperationType,
    /// `m`
    Metric,
    /// `d`
    DataEntity,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 8] = [
        SegmentKind::Tenant,
        SegmentKind::Feed,
        SegmentKind::Resource,
        SegmentKind::ResourceType,
        SegmentKind::MetricType,
        SegmentKind::OperationType,
        SegmentKind::Metric,
        SegmentKind::DataEntity,
    ];

    /// Token prefix used in the serialized path.
    pub const fn prefix(&self) -> &'static str {
        match self {
            SegmentKind::Tenant => "t",
            SegmentKind::Feed => "f",
            SegmentKind::Resource => "r",
            SegmentKind::ResourceType => "rt",
            SegmentKind::MetricType => "mt",
            SegmentKind::OperationType => "ot",
            SegmentKind::Metric => "m",
            SegmentKind::DataEntity => "d",
        }
    }

    /// Kind tag used by entity filters and snapshot `children` maps.
    pub const fn name(&self) -> &'static str {
        match self {
            SegmentKind::Tenant => "tenant",
            SegmentKind::Feed => "feed",
            SegmentKind::Resource => "resource",
            SegmentKind::ResourceType => "resourceType",
            SegmentKind::MetricType => "metricType",
            SegmentKind::OperationType => "operationType",
            SegmentKind::Metric => "metric",
            SegmentKind::DataEntity => "dataEntity",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<SegmentKind> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }

    /// Kinds that nothing may be appended below via `down`.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, SegmentKind::Tenant | SegmentKind::Feed | SegmentKind::Resource)
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One `(kind, id)` pair. The id is held unescaped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub kind: SegmentKind,
    pub id: String,
}

impl Segment {
    pub fn new(kind: SegmentKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{}",
            self.kind.prefix(),
            super::escape::escape_id(&self.id)
        )
    }
}
