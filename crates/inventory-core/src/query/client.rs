//! Public inventory queries.
//!
//! Every operation reads the latest snapshots through a [`SnapshotSource`],
//! navigates into them and materializes typed entities. Nothing is cached
//! between calls. Missing data yields empty results; malformed arguments
//! fail immediately.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::InventoryConfig;
use crate::errors::{InventoryError, InventoryResult};
use crate::models::{Metric, Properties, Resource, ResourceType};
use crate::path::{parse_resource_chain, snapshot_key_with_prefix, CanonicalPath, SegmentKind};
use crate::query::filter::EntityFilter;
use crate::snapshot::materializer::{
    collect_metrics, configuration_value, metric_type_keys, resolve_metrics,
};
use crate::snapshot::{locate, materialize, materialize_children, RawSnapshot};
use crate::store::tags::{resource_type_tag, TagQuery, FEED_TAG, TYPE_TAG};
use crate::store::SnapshotSource;

const ROOT_RESOURCE_TYPE: &str = "r";
const RESOURCE_TYPE_TYPE: &str = "rt";

pub struct InventoryClient<S> {
    source: S,
    config: InventoryConfig,
}

impl<S: SnapshotSource> InventoryClient<S> {
    pub fn new(source: S, config: InventoryConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Every feed that has reported inventory. Empty when none has.
    pub fn list_feeds(&self) -> InventoryResult<Vec<String>> {
        let values = self
            .source
            .tag_values(&TagQuery::inventory().any(FEED_TAG))?;
        Ok(values.get(FEED_TAG).cloned().unwrap_or_default())
    }

    pub fn list_resource_types(&self, feed_id: Option<&str>) -> InventoryResult<Vec<ResourceType>> {
        let feed = require_feed(feed_id, "listing resource types")?;
        let query = TagQuery::inventory()
            .exact(FEED_TAG, feed)
            .exact(TYPE_TAG, RESOURCE_TYPE_TYPE);
        let base = self.feed_path(feed);

        let mut types = Vec::new();
        for (key, raw) in self.fetch_tagged(&query)? {
            let record = materialize(&raw, |id| base.to_resource_type(id), false)?;
            match ResourceType::from_record(record) {
                Ok(rt) => types.push(rt),
                Err(err) => warn!("skipping resource type snapshot {key}: {err}"),
            }
        }
        Ok(types)
    }

    /// Top-level resources reported by `feed_id`.
    pub fn list_resources_for_feed(
        &self,
        feed_id: Option<&str>,
        fetch_properties: bool,
        filter: &EntityFilter,
    ) -> InventoryResult<Vec<Resource>> {
        let feed = require_feed(feed_id, "listing resources")?;
        let roots = self.root_resources(feed, fetch_properties)?;
        Ok(filter.apply(roots))
    }

    /// Every resource, at any depth, declaring the type at
    /// `resource_type_path`.
    ///
    /// Root snapshots declaring the type are found by tag; each carries the
    /// relative chains of the matching resources inside it.
    pub fn list_resources_for_type(
        &self,
        resource_type_path: &CanonicalPath,
        fetch_properties: bool,
    ) -> InventoryResult<Vec<Resource>> {
        if resource_type_path.last_kind() != SegmentKind::ResourceType {
            return Err(InventoryError::MissingResourceType(
                resource_type_path.to_string(),
            ));
        }
        let type_id = &resource_type_path.last().id;
        let type_tag = resource_type_tag(type_id);
        let mut query = TagQuery::inventory()
            .exact(TYPE_TAG, ROOT_RESOURCE_TYPE)
            .any(&type_tag);
        if let Some(feed) = resource_type_path.feed() {
            query = query.exact(FEED_TAG, feed);
        }

        let tagged = self.source.tagged_keys(&query)?;
        if tagged.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = tagged.iter().map(|t| t.key.clone()).collect();
        let blobs = self.source.get_raw_batch(&keys)?;

        let mut resources = Vec::new();
        for entry in &tagged {
            let Some(raw) = blobs.get(&entry.key).and_then(|b| decode_or_skip(&entry.key, b)) else {
                continue;
            };
            let Some(feed) = entry.tag(FEED_TAG).or(resource_type_path.feed()) else {
                warn!("snapshot {} declares {type_id} but has no feed", entry.key);
                continue;
            };
            let mut base = CanonicalPath::from_feed(feed);
            match resource_type_path.tenant() {
                Some(tenant) => base = base.with_tenant(tenant),
                None => base = self.stamp_tenant(base),
            }
            let relative_paths = entry.tag(&type_tag).unwrap_or_default();
            for relative in relative_paths.split(',').filter(|p| !p.is_empty()) {
                if let Some(resource) =
                    self.resolve_relative(&raw, &base, relative, fetch_properties)?
                {
                    resources.push(resource);
                }
            }
        }
        Ok(resources)
    }

    /// Keys of inventory snapshots whose tags match `tag_expression`, in
    /// the `name:pattern,...` form of [`TagQuery::parse`].
    pub fn find_snapshot_keys(&self, tag_expression: &str) -> InventoryResult<Vec<String>> {
        let query = TagQuery::inventory().and(TagQuery::parse(tag_expression)?);
        debug!("finding snapshot keys matching '{tag_expression}'");
        Ok(self
            .source
            .tagged_keys(&query)?
            .into_iter()
            .map(|tagged| tagged.key)
            .collect())
    }

    /// The `configuration` data entity of a resource, independent of the
    /// resource's own materialization.
    pub fn get_config_data_for_resource(
        &self,
        resource_path: &CanonicalPath,
    ) -> InventoryResult<Option<Properties>> {
        require_resource(resource_path)?;
        let config = self.with_located(resource_path, |raw| Ok(configuration_value(raw).cloned()))?;
        Ok(config.flatten())
    }

    /// Children of a resource (or the top-level resources of a feed path).
    /// With `recursive`, every descendant level in depth-first pre-order.
    pub fn list_child_resources(
        &self,
        parent_path: &CanonicalPath,
        recursive: bool,
    ) -> InventoryResult<Vec<Resource>> {
        let Some(feed) = parent_path.feed() else {
            return Err(InventoryError::MissingFeed(parent_path.to_string()));
        };
        debug!("listing children of {parent_path} (recursive={recursive})");

        let records = match parent_path.last_kind() {
            SegmentKind::Resource => self
                .with_located(parent_path, |raw| {
                    materialize_children(raw, parent_path, recursive)
                })?
                .unwrap_or_default(),
            SegmentKind::Feed => {
                let mut records = Vec::new();
                for (key, raw) in self.fetch_tagged(&self.root_query(feed))? {
                    if raw.id().is_empty() {
                        warn!("skipping root resource snapshot {key}: empty id");
                        continue;
                    }
                    let record = materialize(&raw, |id| parent_path.down(id), false)?;
                    let root_path = record.path.clone();
                    records.push(record);
                    if recursive {
                        records.extend(materialize_children(&raw, &root_path, true)?);
                    }
                }
                records
            }
            _ => {
                return Err(InventoryError::malformed_path(
                    &parent_path.to_string(),
                    "only feeds and resources have child resources",
                ))
            }
        };
        Ok(records
            .into_iter()
            .filter_map(|record| match Resource::from_record(record) {
                Ok(resource) => Some(resource),
                Err(err) => {
                    warn!("skipping child resource: {err}");
                    None
                }
            })
            .collect())
    }

    /// Metrics of a resource whose metric type could be resolved.
    pub fn list_metrics_for_resource(
        &self,
        resource_path: &CanonicalPath,
        filter: &EntityFilter,
    ) -> InventoryResult<Vec<Metric>> {
        require_resource(resource_path)?;
        let pending = self
            .with_located(resource_path, |raw| collect_metrics(raw, resource_path))?
            .unwrap_or_default();
        let keys = metric_type_keys(&pending, &self.config.key_prefix);
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let types = self.source.get_raw_batch(&keys)?;
        let metrics = resolve_metrics(pending, &types, &self.config.key_prefix);
        Ok(filter.apply(metrics))
    }

    pub fn get_resource(
        &self,
        resource_path: &CanonicalPath,
        fetch_properties: bool,
    ) -> InventoryResult<Option<Resource>> {
        require_resource(resource_path)?;
        self.with_located(resource_path, |raw| {
            let record = materialize(raw, |_| Ok(resource_path.clone()), fetch_properties)?;
            Resource::from_record(record)
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn key(&self, path: &CanonicalPath) -> String {
        snapshot_key_with_prefix(path, &self.config.key_prefix)
    }

    fn stamp_tenant(&self, path: CanonicalPath) -> CanonicalPath {
        match &self.config.tenant_id {
            Some(tenant) => path.with_tenant(tenant),
            None => path,
        }
    }

    fn feed_path(&self, feed: &str) -> CanonicalPath {
        self.stamp_tenant(CanonicalPath::from_feed(feed))
    }

    fn root_query(&self, feed: &str) -> TagQuery {
        TagQuery::inventory()
            .exact(FEED_TAG, feed)
            .exact(TYPE_TAG, ROOT_RESOURCE_TYPE)
    }

    fn root_resources(&self, feed: &str, fetch_properties: bool) -> InventoryResult<Vec<Resource>> {
        let base = self.feed_path(feed);
        let mut resources = Vec::new();
        for (key, raw) in self.fetch_tagged(&self.root_query(feed))? {
            let record = materialize(&raw, |id| base.down(id), fetch_properties)?;
            match Resource::from_record(record) {
                Ok(resource) => resources.push(resource),
                Err(err) => warn!("skipping root resource snapshot {key}: {err}"),
            }
        }
        Ok(resources)
    }

    /// Decoded latest snapshots of every key matching `query`, in tag order.
    fn fetch_tagged(&self, query: &TagQuery) -> InventoryResult<Vec<(String, RawSnapshot)>> {
        let keys: Vec<String> = self
            .source
            .tagged_keys(query)?
            .into_iter()
            .map(|t| t.key)
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let blobs = self.source.get_raw_batch(&keys)?;
        Ok(blobs
            .iter()
            .filter_map(|(key, blob)| decode_or_skip(key, blob).map(|raw| (key.clone(), raw)))
            .collect())
    }

    /// Fetch the root snapshot holding `path`, walk to `path` and run `f` on
    /// the located sub-tree. `None` when the snapshot or any step is missing.
    fn with_located<T, F>(&self, path: &CanonicalPath, f: F) -> InventoryResult<Option<T>>
    where
        F: FnOnce(&RawSnapshot) -> InventoryResult<T>,
    {
        let Some(root_path) = path.root_resource() else {
            return Ok(None);
        };
        let key = self.key(&root_path);
        let Some(blob) = self.source.get_raw(&key)? else {
            debug!("no snapshot stored under {key}");
            return Ok(None);
        };
        let root = RawSnapshot::from_value(&key, blob)?;
        match locate(&root, &path.relative_resource_ids()) {
            Ok(found) => f(found).map(Some),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn resolve_relative(
        &self,
        root: &RawSnapshot,
        base: &CanonicalPath,
        relative: &str,
        fetch_properties: bool,
    ) -> InventoryResult<Option<Resource>> {
        let chain = match parse_resource_chain(relative) {
            Ok(chain) => chain,
            Err(err) => {
                warn!("ignoring relative path '{relative}' of {}: {err}", root.id());
                return Ok(None);
            }
        };
        if chain[0] != root.id() {
            debug!("relative path '{relative}' does not start at root '{}'", root.id());
            return Ok(None);
        }
        let located = match locate(root, &chain[1..]) {
            Ok(found) => found,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        let mut parent = base.clone();
        for id in &chain[..chain.len() - 1] {
            parent = parent.down(id)?;
        }
        let record = materialize(located, |id| parent.down(id), fetch_properties)?;
        match Resource::from_record(record) {
            Ok(resource) => Ok(Some(resource)),
            Err(err) => {
                warn!("ignoring relative path '{relative}' of {}: {err}", root.id());
                Ok(None)
            }
        }
    }
}

fn require_feed<'a>(feed_id: Option<&'a str>, context: &str) -> InventoryResult<&'a str> {
    match feed_id {
        Some(feed) if !feed.is_empty() => Ok(feed),
        _ => Err(InventoryError::MissingFeed(context.to_string())),
    }
}

fn require_resource(path: &CanonicalPath) -> InventoryResult<()> {
    if path.feed().is_none() {
        return Err(InventoryError::MissingFeed(path.to_string()));
    }
    if !path.is_resource() {
        return Err(InventoryError::malformed_path(
            &path.to_string(),
            "does not address a resource",
        ));
    }
    Ok(())
}

fn decode_or_skip(key: &str, blob: &Value) -> Option<RawSnapshot> {
    match RawSnapshot::from_value(key, blob.clone()) {
        Ok(raw) => Some(raw),
        Err(err) => {
            warn!("skipping snapshot: {err}");
            None
        }
    }
}
