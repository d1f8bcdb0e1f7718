//! Kind / id-substring selection over materialized entities.

use serde::Deserialize;

use crate::models::InventoryEntity;

/// Both constraints are optional and combine with AND. Matching is
/// case-sensitive and runs on unescaped ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EntityFilter {
    /// Exact kind tag, e.g. `resource` or `metric`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Substring the id must contain.
    #[serde(rename = "match")]
    pub id_match: Option<String>,
}

impl EntityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn with_id_match(mut self, needle: &str) -> Self {
        self.id_match = Some(needle.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.id_match.is_none()
    }

    pub fn matches<E: InventoryEntity>(&self, entity: &E) -> bool {
        if let Some(kind) = &self.kind {
            if entity.kind().name() != kind {
                return false;
            }
        }
        if let Some(needle) = &self.id_match {
            if !entity.id().contains(needle.as_str()) {
                return false;
            }
        }
        true
    }

    /// Keep matching entities, preserving order.
    pub fn apply<E: InventoryEntity>(&self, entities: Vec<E>) -> Vec<E> {
        if self.is_empty() {
            return entities;
        }
        entities.into_iter().filter(|e| self.matches(e)).collect()
    }
}
