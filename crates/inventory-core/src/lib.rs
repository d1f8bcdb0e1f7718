//! Inventory core library: reconstructs a monitored-resource inventory from
//! the latest stored snapshots.
//!
//! A discovery agent (a *feed*) periodically reports the resource tree it
//! sees. Each top-level resource is stored as one JSON snapshot holding all
//! of its descendants, metrics and data entities. This crate provides the
//! canonical path algebra used to address entities, the navigation and
//! materialization of snapshot trees into typed entities, and the query
//! operations that tie both to a [`store::SnapshotSource`].
//!
//! With the `python` feature the crate also builds as a Python extension
//! module (`_inventory_core`).

pub mod config;
pub mod errors;
pub mod models;
pub mod path;
pub mod query;
pub mod snapshot;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use config::InventoryConfig;
pub use errors::{InventoryError, InventoryResult};
pub use models::{InventoryEntity, Metric, MetricType, Properties, Resource, ResourceType};
pub use path::{CanonicalPath, Segment, SegmentKind};
pub use query::{EntityFilter, InventoryClient};
pub use store::{MemorySnapshotSource, SnapshotDatabase, SnapshotSource};

// ---------------------------------------------------------------------------
// Top-level Python module: _inventory_core
// ---------------------------------------------------------------------------

#[cfg(feature = "python")]
#[pyo3::pymodule]
fn _inventory_core(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    python::register(m)
}
