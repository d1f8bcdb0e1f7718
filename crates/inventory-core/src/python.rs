//! Python bindings.
//!
//! Structured results cross the boundary as JSON and are handed back as
//! native Python objects via `json.loads`.

use pyo3::prelude::*;
use pyo3::wrap_pyfunction;
use serde::Serialize;

use crate::config::InventoryConfig;
use crate::path::{self, CanonicalPath};
use crate::query::{EntityFilter, InventoryClient};
use crate::store::SnapshotDatabase;

pub(crate) fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("SNAPSHOT_KEY_PREFIX", path::SNAPSHOT_KEY_PREFIX)?;

    // -- Path codec ---------------------------------------------------------
    m.add_function(wrap_pyfunction!(escape_id, m)?)?;
    m.add_function(wrap_pyfunction!(unescape_id, m)?)?;
    m.add_function(wrap_pyfunction!(parse_path, m)?)?;
    m.add_function(wrap_pyfunction!(snapshot_key, m)?)?;

    // -- Store and client ---------------------------------------------------
    m.add_class::<SnapshotDatabase>()?;
    m.add_class::<PyInventoryClient>()?;
    Ok(())
}

fn to_py<T: Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let json_str = serde_json::to_string(value)
        .map_err(|e| pyo3::exceptions::PyRuntimeError::new_err(e.to_string()))?;
    let json_module = py.import("json")?;
    json_module
        .call_method1("loads", (json_str,))
        .map(|o| o.unbind())
}

fn parse_filter(filter: Option<&str>) -> PyResult<EntityFilter> {
    match filter {
        Some(text) => serde_json::from_str(text)
            .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string())),
        None => Ok(EntityFilter::default()),
    }
}

// ---------------------------------------------------------------------------
// Path codec
// ---------------------------------------------------------------------------

#[pyfunction]
fn escape_id(raw: &str) -> String {
    path::escape_id(raw)
}

#[pyfunction]
fn unescape_id(text: &str) -> String {
    path::unescape_id(text)
}

/// `(kind, id)` pairs of a canonical path; raises `ValueError` when the
/// text is malformed.
#[pyfunction]
fn parse_path(text: &str) -> PyResult<Vec<(String, String)>> {
    let parsed = CanonicalPath::parse(text)?;
    Ok(parsed
        .segments()
        .iter()
        .map(|s| (s.kind.name().to_string(), s.id.clone()))
        .collect())
}

#[pyfunction]
#[pyo3(signature = (text, prefix=None))]
fn snapshot_key(text: &str, prefix: Option<&str>) -> PyResult<String> {
    let parsed = CanonicalPath::parse(text)?;
    Ok(path::snapshot_key_with_prefix(
        &parsed,
        prefix.unwrap_or(path::SNAPSHOT_KEY_PREFIX),
    ))
}

// ---------------------------------------------------------------------------
// SnapshotDatabase
// ---------------------------------------------------------------------------

#[pymethods]
impl SnapshotDatabase {
    #[new]
    fn py_new(db_path: std::path::PathBuf) -> PyResult<Self> {
        Ok(SnapshotDatabase::new(db_path)?)
    }

    #[pyo3(name = "init_schema")]
    fn py_init_schema(&self) -> PyResult<()> {
        Ok(self.init_schema()?)
    }

    /// Store a JSON-encoded blob.
    #[pyo3(name = "put_snapshot")]
    fn py_put_snapshot(&self, key: &str, timestamp: i64, blob_json: &str) -> PyResult<()> {
        let blob: serde_json::Value = serde_json::from_str(blob_json)
            .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?;
        Ok(self.put_snapshot(key, timestamp, &blob)?)
    }

    #[pyo3(name = "set_tags")]
    fn py_set_tags(&self, key: &str, tags: Vec<(String, String)>) -> PyResult<()> {
        Ok(self.set_tags(key, &tags.into_iter().collect())?)
    }

    #[pyo3(name = "prune_before")]
    fn py_prune_before(&self, before: i64) -> PyResult<usize> {
        Ok(self.prune_before(before)?)
    }
}

// ---------------------------------------------------------------------------
// InventoryClient
// ---------------------------------------------------------------------------

#[pyclass(name = "InventoryClient")]
pub struct PyInventoryClient {
    inner: InventoryClient<SnapshotDatabase>,
}

#[pymethods]
impl PyInventoryClient {
    #[new]
    #[pyo3(signature = (db_path, tenant_id=None, key_prefix=None))]
    fn new(
        db_path: std::path::PathBuf,
        tenant_id: Option<&str>,
        key_prefix: Option<&str>,
    ) -> PyResult<Self> {
        let mut config = InventoryConfig::default();
        if let Some(tenant) = tenant_id {
            config = config.with_tenant(tenant);
        }
        if let Some(prefix) = key_prefix {
            config.key_prefix = prefix.to_string();
        }
        let db = SnapshotDatabase::new(db_path)?;
        db.init_schema()?;
        Ok(Self {
            inner: InventoryClient::new(db, config),
        })
    }

    fn list_feeds(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py(py, &self.inner.list_feeds()?)
    }

    /// `tag_expression` takes `name:pattern,...`; `*` only requires the tag.
    fn find_snapshot_keys(&self, tag_expression: &str) -> PyResult<Vec<String>> {
        Ok(self.inner.find_snapshot_keys(tag_expression)?)
    }

    #[pyo3(signature = (feed_id=None))]
    fn list_resource_types(&self, py: Python<'_>, feed_id: Option<&str>) -> PyResult<PyObject> {
        to_py(py, &self.inner.list_resource_types(feed_id)?)
    }

    /// `filter_json` takes `{"type": ..., "match": ...}`.
    #[pyo3(signature = (feed_id=None, fetch_properties=false, filter_json=None))]
    fn list_resources_for_feed(
        &self,
        py: Python<'_>,
        feed_id: Option<&str>,
        fetch_properties: bool,
        filter_json: Option<&str>,
    ) -> PyResult<PyObject> {
        let filter = parse_filter(filter_json)?;
        to_py(
            py,
            &self
                .inner
                .list_resources_for_feed(feed_id, fetch_properties, &filter)?,
        )
    }

    #[pyo3(signature = (resource_type_path, fetch_properties=false))]
    fn list_resources_for_type(
        &self,
        py: Python<'_>,
        resource_type_path: &str,
        fetch_properties: bool,
    ) -> PyResult<PyObject> {
        let type_path = CanonicalPath::parse(resource_type_path)?;
        to_py(
            py,
            &self
                .inner
                .list_resources_for_type(&type_path, fetch_properties)?,
        )
    }

    fn get_config_data_for_resource(&self, py: Python<'_>, resource_path: &str) -> PyResult<PyObject> {
        let path = CanonicalPath::parse(resource_path)?;
        to_py(py, &self.inner.get_config_data_for_resource(&path)?)
    }

    #[pyo3(signature = (parent_path, recursive=false))]
    fn list_child_resources(
        &self,
        py: Python<'_>,
        parent_path: &str,
        recursive: bool,
    ) -> PyResult<PyObject> {
        let path = CanonicalPath::parse(parent_path)?;
        to_py(py, &self.inner.list_child_resources(&path, recursive)?)
    }

    #[pyo3(signature = (resource_path, filter_json=None))]
    fn list_metrics_for_resource(
        &self,
        py: Python<'_>,
        resource_path: &str,
        filter_json: Option<&str>,
    ) -> PyResult<PyObject> {
        let path = CanonicalPath::parse(resource_path)?;
        let filter = parse_filter(filter_json)?;
        to_py(py, &self.inner.list_metrics_for_resource(&path, &filter)?)
    }

    #[pyo3(signature = (resource_path, fetch_properties=false))]
    fn get_resource(
        &self,
        py: Python<'_>,
        resource_path: &str,
        fetch_properties: bool,
    ) -> PyResult<PyObject> {
        let path = CanonicalPath::parse(resource_path)?;
        to_py(py, &self.inner.get_resource(&path, fetch_properties)?)
    }
}
