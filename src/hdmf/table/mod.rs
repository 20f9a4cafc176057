//! Columnar tables: row keys, columns, the table that keeps them in lockstep, and
//! regions that point into a table's rows.

pub mod dynamic_table;
pub mod dynamic_table_region;
pub mod element_identifiers;
pub mod vector_data;

pub use dynamic_table::DynamicTable;
pub use dynamic_table_region::DynamicTableRegion;
pub use element_identifiers::ElementIdentifiers;
pub use vector_data::VectorData;

/// Group attribute listing a table's columns in insertion order.
pub const COLNAMES_ATTR: &str = "colnames";

/// Name of a table's row-key dataset.
pub const ID_COLUMN: &str = "id";
