//! Typed inventory entities built from materialized snapshot records.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{InventoryError, InventoryResult};
use crate::path::{CanonicalPath, SegmentKind};
use crate::snapshot::materializer::EntityRecord;

/// String-keyed bag of arbitrary JSON values.
pub type Properties = Map<String, Value>;

/// Data field holding a resource's type reference.
pub const RESOURCE_TYPE_PATH_FIELD: &str = "resourceTypePath";

/// Data field holding a metric's type reference.
pub const METRIC_TYPE_PATH_FIELD: &str = "metricTypePath";

/// Capabilities shared by every entity variant.
pub trait InventoryEntity {
    fn id(&self) -> &str;
    fn path(&self) -> &CanonicalPath;
    fn properties(&self) -> &Properties;
    /// Kind tag, matching the terminal segment of [`InventoryEntity::path`].
    fn kind(&self) -> SegmentKind;
}

// ---------------------------------------------------------------------------
// ResourceType
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResourceType {
    pub id: String,
    pub path: CanonicalPath,
    pub name: Option<String>,
    pub properties: Properties,
}

impl ResourceType {
    pub fn from_record(record: EntityRecord) -> InventoryResult<Self> {
        check_identity(&record, SegmentKind::ResourceType)?;
        Ok(Self {
            id: record.id().to_string(),
            name: record.str_field("name"),
            properties: record.properties(),
            path: record.path,
        })
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Resource {
    pub id: String,
    pub path: CanonicalPath,
    pub name: Option<String>,
    /// Id of the declared resource type, if the snapshot names one.
    pub type_id: Option<String>,
    pub type_path: Option<CanonicalPath>,
    pub properties: Properties,
}

impl Resource {
    pub fn from_record(record: EntityRecord) -> InventoryResult<Self> {
        check_identity(&record, SegmentKind::Resource)?;
        let type_path = record
            .str_field(RESOURCE_TYPE_PATH_FIELD)
            .and_then(|text| match CanonicalPath::parse(&text) {
                Ok(path) => Some(path),
                Err(err) => {
                    tracing::debug!("ignoring type reference of {}: {err}", record.path);
                    None
                }
            });
        let type_id = type_path
            .as_ref()
            .and_then(|p| p.type_segment())
            .filter(|seg| seg.kind == SegmentKind::ResourceType)
            .map(|seg| seg.id.clone());
        Ok(Self {
            id: record.id().to_string(),
            name: record.str_field("name"),
            type_id,
            type_path,
            properties: record.properties(),
            path: record.path,
        })
    }
}

// ---------------------------------------------------------------------------
// MetricType / Metric
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricType {
    pub id: String,
    pub path: CanonicalPath,
    /// Every data field of the type snapshot except its id
    /// (`type`, `unit`, `collectionInterval`, ...).
    pub properties: Properties,
}

impl MetricType {
    pub fn from_record(record: EntityRecord) -> InventoryResult<Self> {
        check_identity(&record, SegmentKind::MetricType)?;
        let mut properties = record.data.clone();
        properties.remove("id");
        properties.remove("path");
        Ok(Self {
            id: record.id().to_string(),
            path: record.path,
            properties,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metric {
    pub id: String,
    pub path: CanonicalPath,
    pub name: Option<String>,
    pub properties: Properties,
    pub metric_type: MetricType,
}

impl Metric {
    pub fn from_record(record: EntityRecord, metric_type: MetricType) -> InventoryResult<Self> {
        check_identity(&record, SegmentKind::Metric)?;
        Ok(Self {
            id: record.id().to_string(),
            name: record.str_field("name"),
            properties: record.properties(),
            path: record.path,
            metric_type,
        })
    }
}

macro_rules! impl_inventory_entity {
    ($ty:ty, $kind:expr) => {
        impl InventoryEntity for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn path(&self) -> &CanonicalPath {
                &self.path
            }
            fn properties(&self) -> &Properties {
                &self.properties
            }
            fn kind(&self) -> SegmentKind {
                $kind
            }
        }
    };
}

impl_inventory_entity!(ResourceType, SegmentKind::ResourceType);
impl_inventory_entity!(Resource, SegmentKind::Resource);
impl_inventory_entity!(MetricType, SegmentKind::MetricType);
impl_inventory_entity!(Metric, SegmentKind::Metric);

fn check_identity(record: &EntityRecord, expected: SegmentKind) -> InventoryResult<()> {
    if record.id().is_empty() {
        return Err(InventoryError::MalformedSnapshot {
            key: record.path.snapshot_key(),
            reason: format!("{expected} at {} has an empty id", record.path),
        });
    }
    if record.path.last_kind() != expected {
        return Err(InventoryError::malformed_path(
            &record.path.to_string(),
            format!("expected a {expected} path"),
        ));
    }
    Ok(())
}
