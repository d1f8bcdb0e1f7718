//! Tag queries and the tag conventions of inventory snapshots.
//!
//! Every stored snapshot key carries a flat set of string tags:
//!
//! | tag              | value                                              |
//! |------------------|----------------------------------------------------|
//! | `module`         | always `inventory`                                 |
//! | `feed`           | feed id (absent for feedless types)                |
//! | `type`           | `r` (root resource), `rt` or `mt`                  |
//! | `rt.<type id>`   | on `r` keys: comma-joined relative resource chains |
//! |                  | (`r;root`, `r;root/r;child`) declaring that type   |

use indexmap::IndexMap;
use regex::Regex;

use crate::errors::{InventoryError, InventoryResult};
use crate::path::{escape_id, SegmentKind};

pub const MODULE_TAG: &str = "module";
pub const MODULE_VALUE: &str = "inventory";
pub const FEED_TAG: &str = "feed";
pub const TYPE_TAG: &str = "type";

/// Name of the tag listing where a resource type occurs inside a root
/// resource snapshot.
pub fn resource_type_tag(type_id: &str) -> String {
    format!("{}.{}", SegmentKind::ResourceType.prefix(), escape_id(type_id))
}

/// How one tag value is matched.
#[derive(Clone, Debug)]
pub enum TagPattern {
    /// The tag must be present, any value.
    Any,
    Exact(String),
    /// Anchored regular expression over the whole value.
    Regex(Regex),
}

impl TagPattern {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            TagPattern::Any => true,
            TagPattern::Exact(expected) => expected == value,
            TagPattern::Regex(re) => re.is_match(value),
        }
    }

    fn regex(pattern: &str) -> InventoryResult<Self> {
        Regex::new(&format!("^(?:{pattern})$"))
            .map(TagPattern::Regex)
            .map_err(|e| InventoryError::InvalidTagQuery(format!("'{pattern}': {e}")))
    }
}

/// Conjunction of per-tag patterns.
#[derive(Clone, Debug, Default)]
pub struct TagQuery {
    filters: Vec<(String, TagPattern)>,
}

impl TagQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query selecting every inventory snapshot.
    pub fn inventory() -> Self {
        Self::new().exact(MODULE_TAG, MODULE_VALUE)
    }

    /// Parse `name:pattern,name:pattern`. A pattern of `*` only requires
    /// the tag to be present; anything else is an anchored regex.
    pub fn parse(text: &str) -> InventoryResult<Self> {
        let mut query = Self::new();
        for clause in text.split(',').filter(|c| !c.trim().is_empty()) {
            let (name, pattern) = clause.split_once(':').ok_or_else(|| {
                InventoryError::InvalidTagQuery(format!("'{clause}' is not name:pattern"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(InventoryError::InvalidTagQuery(format!(
                    "'{clause}' has an empty tag name"
                )));
            }
            query = if pattern == "*" {
                query.any(name)
            } else {
                query.pattern(name, pattern)?
            };
        }
        Ok(query)
    }

    pub fn any(mut self, name: &str) -> Self {
        self.filters.push((name.to_string(), TagPattern::Any));
        self
    }

    pub fn exact(mut self, name: &str, value: &str) -> Self {
        self.filters
            .push((name.to_string(), TagPattern::Exact(value.to_string())));
        self
    }

    pub fn pattern(mut self, name: &str, pattern: &str) -> InventoryResult<Self> {
        self.filters.push((name.to_string(), TagPattern::regex(pattern)?));
        Ok(self)
    }

    /// Conjunction of both queries.
    pub fn and(mut self, other: TagQuery) -> Self {
        self.filters.extend(other.filters);
        self
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn matches(&self, tags: &IndexMap<String, String>) -> bool {
        self.filters.iter().all(|(name, pattern)| {
            tags.get(name)
                .map(|value| pattern.matches(value))
                .unwrap_or(false)
        })
    }
}

/// A snapshot key and every tag stored for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaggedKey {
    pub key: String,
    pub tags: IndexMap<String, String>,
}

impl TaggedKey {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}
