//! Canonical path algebra.
//!
//! A canonical path encodes an entity's full ancestry in one string, e.g.
//! `/t;acme/f;feed1/r;server1/r;ds1/m;heap`. Each token is
//! `prefix;escaped-id`; see [`SegmentKind`] for the prefixes and
//! [`CanonicalPath`] for the legal nesting order.

pub mod canonical;
pub mod escape;
pub mod key;
pub mod segment;

pub use canonical::{parse_resource_chain, CanonicalPath};
pub use escape::{escape_id, unescape_id};
pub use key::{snapshot_key_with_prefix, to_snapshot_key, SNAPSHOT_KEY_PREFIX, SNAPSHOT_KEY_SEPARATOR};
pub use segment::{Segment, SegmentKind};
