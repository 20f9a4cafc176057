//! Entities of the `hdmf-common` namespace: generic containers, datasets, and tables.

pub mod container;
pub mod data;
pub mod table;

pub use container::Container;
pub use data::Data;
pub use table::{DynamicTable, DynamicTableRegion, ElementIdentifiers, VectorData};

/// Namespace of the common data-model types.
pub const HDMF_COMMON: &str = "hdmf-common";
