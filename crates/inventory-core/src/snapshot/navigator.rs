//! Descent into a root snapshot along a resource id chain.
//!
//! One snapshot blob is stored per top-level resource, so every descendant
//! is reached by walking `children.resource` from that root without another
//! fetch.

use tracing::debug;

use crate::errors::{InventoryError, InventoryResult};
use crate::snapshot::raw::RawSnapshot;

/// Walk one `children.resource` level per id, matching on the unescaped
/// `data.id`. The first match in stored order wins. An empty chain yields
/// `root` itself.
pub fn locate<'a, S: AsRef<str>>(
    root: &'a RawSnapshot,
    relative_ids: &[S],
) -> InventoryResult<&'a RawSnapshot> {
    let mut current = root;
    for (depth, target) in relative_ids.iter().enumerate() {
        let target = target.as_ref();
        current = current
            .child_resources()
            .iter()
            .find(|child| child.id() == target)
            .ok_or_else(|| {
                debug!(
                    "no child resource '{target}' at depth {} below '{}'",
                    depth + 1,
                    current.id()
                );
                InventoryError::NotFound(format!(
                    "resource '{target}' under '{}'",
                    current.id()
                ))
            })?;
    }
    Ok(current)
}
