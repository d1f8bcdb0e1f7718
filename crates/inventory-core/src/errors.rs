//! Error types for the inventory core library.

#[cfg(feature = "python")]
use pyo3::exceptions::{PyIOError, PyLookupError, PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;

/// Top-level error enum for the inventory core library.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Malformed path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("Cannot descend below terminal path '{0}'")]
    TerminalPath(String),

    #[error("Cannot move up from root path '{0}'")]
    RootPath(String),

    #[error("A feed is required: {0}")]
    MissingFeed(String),

    #[error("A resource type is required: {0}")]
    MissingResourceType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed snapshot '{key}': {reason}")]
    MalformedSnapshot { key: String, reason: String },

    #[error("Invalid tag query: {0}")]
    InvalidTagQuery(String),

    #[error("Snapshot store schema v{found} is newer than supported v{supported}")]
    UnsupportedSchema { found: i32, supported: i32 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InventoryError {
    pub(crate) fn malformed_path(path: &str, reason: impl Into<String>) -> Self {
        InventoryError::MalformedPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// True for "no such entity" failures that list operations turn into
    /// empty results.
    pub fn is_not_found(&self) -> bool {
        matches!(self, InventoryError::NotFound(_))
    }
}

#[cfg(feature = "python")]
impl From<InventoryError> for PyErr {
    fn from(err: InventoryError) -> PyErr {
        match &err {
            InventoryError::MalformedPath { .. }
            | InventoryError::TerminalPath(_)
            | InventoryError::RootPath(_)
            | InventoryError::MissingFeed(_)
            | InventoryError::MissingResourceType(_)
            | InventoryError::InvalidTagQuery(_) => PyValueError::new_err(err.to_string()),
            InventoryError::NotFound(_) => PyLookupError::new_err(err.to_string()),
            InventoryError::MalformedSnapshot { .. } | InventoryError::Json(_) => {
                PyValueError::new_err(err.to_string())
            }
            InventoryError::Transport(_)
            | InventoryError::Sqlite(_)
            | InventoryError::UnsupportedSchema { .. } => {
                PyRuntimeError::new_err(err.to_string())
            }
            InventoryError::Io(_) => PyIOError::new_err(err.to_string()),
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;
