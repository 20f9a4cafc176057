//! # Rust NWB Core Library
//!
//! Schema-driven persistence for scientific time-series recordings. Typed entities
//! (containers, datasets, tables) are written into a hierarchical container through a
//! storage-agnostic I/O layer, and can be reconstructed from what is stored. Recording
//! uses a single-writer / multiple-reader (SWMR) protocol so that readers can follow
//! growing datasets while acquisition runs.
//!
//! ## Crate Structure
//!
//! - **`channel`**: Channel metadata from which electrode rows are derived.
//! - **`config`**: Recorder configuration loaded from TOML plus environment overrides
//!   via `figment`. See `config::RecorderConfig`.
//! - **`error`**: The `NwbError` enum used for error handling across the crate.
//! - **`hdmf`**: Generic schema entities of the `hdmf-common` namespace: `Container`,
//!   `Data`, and the table family (`VectorData`, `ElementIdentifiers`, `DynamicTable`,
//!   `DynamicTableRegion`).
//! - **`io`**: The `BaseIo` storage contract, the in-memory backend, the HDF5 backend
//!   (feature `storage_hdf5`), and the SWMR reader side.
//! - **`nwb`**: Entities of the NWB `core` namespace: the `NwbFile` root, `Device`,
//!   `ElectrodeGroup`, the extracellular `ElectrodeTable`, and the `TimeSeries` /
//!   `ElectricalSeries` pair that carries recorded samples.
//! - **`registered_type`**: The `RegisteredType` trait every entity implements and the
//!   closed `Entity` enum produced by the registry.
//! - **`registry`**: `TypeRegistry`, mapping `(namespace, type-name)` to factories.
//! - **`tracing_setup`**: Structured logging initialization.

pub mod channel;
pub mod config;
pub mod error;
pub mod hdmf;
pub mod io;
pub mod nwb;
pub mod registered_type;
pub mod registry;
pub mod tracing_setup;

pub use channel::Channel;
pub use error::{NwbError, NwbResult};
pub use io::{BaseIo, FileMode};
pub use registered_type::{Entity, RegisteredType, TypedEntity};
pub use registry::TypeRegistry;
