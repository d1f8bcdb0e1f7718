//! Raw snapshot trees and their conversion into entities.

pub mod materializer;
pub mod navigator;
pub mod raw;

pub use materializer::{materialize, materialize_children, EntityRecord, PendingMetric};
pub use navigator::locate;
pub use raw::{RawChildren, RawData, RawSnapshot};
