//! Client configuration.
//!
//! One immutable [`InventoryConfig`] is handed to each
//! [`crate::query::InventoryClient`]; there is no process-wide state.

use serde::Deserialize;

use crate::errors::InventoryResult;
use crate::path::SNAPSHOT_KEY_PREFIX;

pub const TENANT_ENV: &str = "INVENTORY_TENANT_ID";
pub const KEY_PREFIX_ENV: &str = "INVENTORY_KEY_PREFIX";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Stamped as the `t;` segment on paths the client builds from bare
    /// ids. Never used for addressing.
    pub tenant_id: Option<String>,
    /// First component of every snapshot key.
    pub key_prefix: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            key_prefix: SNAPSHOT_KEY_PREFIX.to_string(),
        }
    }
}

impl InventoryConfig {
    pub fn from_json_str(text: &str) -> InventoryResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Defaults overridden by `INVENTORY_TENANT_ID` / `INVENTORY_KEY_PREFIX`.
    /// Blank values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();
        if let Some(tenant) = non_blank(TENANT_ENV) {
            config.tenant_id = Some(tenant);
        }
        if let Some(prefix) = non_blank(KEY_PREFIX_ENV) {
            config.key_prefix = prefix;
        }
        config
    }

    pub fn with_tenant(mut self, tenant_id: &str) -> Self {
        self.tenant_id = Some(tenant_id.to_string());
        self
    }
}
