//! Typed view of a decoded snapshot blob.
//!
//! ```json
//! {"data": {"id": "server1", "properties": {...}},
//!  "children": {"resource": [...], "metric": [...], "dataEntity": [...]}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{InventoryError, InventoryResult};
use crate::path::unescape_id;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub data: RawData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<RawChildren>,
}

/// The `data` object. `id` is required; everything else (`properties`,
/// `value`, `name`, type references, ...) is kept as-is in `fields`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawData {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawChildren {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<RawSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metric: Vec<RawSnapshot>,
    #[serde(
        default,
        rename = "dataEntity",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub data_entity: Vec<RawSnapshot>,
    /// Child kinds this engine does not interpret.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl RawSnapshot {
    /// Decode a blob handed over by the snapshot source. `key` is only used
    /// for error reporting.
    pub fn from_value(key: &str, value: Value) -> InventoryResult<Self> {
        serde_json::from_value(value).map_err(|err| InventoryError::MalformedSnapshot {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }

    pub fn id(&self) -> String {
        unescape_id(&self.data.id)
    }

    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.data.fields.get("properties").and_then(Value::as_object)
    }

    pub fn value(&self) -> Option<&Value> {
        self.data.fields.get("value")
    }

    pub fn child_resources(&self) -> &[RawSnapshot] {
        self.children.as_ref().map(|c| c.resource.as_slice()).unwrap_or(&[])
    }

    pub fn child_metrics(&self) -> &[RawSnapshot] {
        self.children.as_ref().map(|c| c.metric.as_slice()).unwrap_or(&[])
    }

    pub fn child_data_entities(&self) -> &[RawSnapshot] {
        self.children.as_ref().map(|c| c.data_entity.as_slice()).unwrap_or(&[])
    }
}
