//! Query layer: the public inventory operations and result filtering.

pub mod client;
pub mod filter;

pub use client::InventoryClient;
pub use filter::EntityFilter;
