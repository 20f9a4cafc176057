//! Entities of the NWB `core` namespace.

pub mod device;
pub mod electrical_series;
pub mod electrode_group;
pub mod electrode_table;
pub mod file;
pub mod time_series;

pub use device::Device;
pub use electrical_series::ElectricalSeries;
pub use electrode_group::ElectrodeGroup;
pub use electrode_table::{ElectrodeTable, ELECTRODE_GROUP_ROOT, ELECTRODE_TABLE_PATH};
pub use file::{NwbFile, ACQUISITION_PATH, DEFAULT_CHUNK_SIZE, NWB_VERSION};
pub use time_series::{SeriesAttributes, TimeSeries};

/// Namespace of the NWB core schema.
pub const CORE: &str = "core";
