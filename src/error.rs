//! Custom error types for the crate.
//!
//! This module defines the primary error type, `NwbError`, shared by the type registry,
//! the entity layer, and the I/O backends. Using the `thiserror` crate, it provides a
//! centralized and consistent way to report the failures a recording session can run
//! into, from registry misconfiguration to backend I/O problems.
//!
//! ## Error Hierarchy
//!
//! Every variant belongs to one [`ErrorCategory`]:
//!
//! - **Configuration**: the program was set up wrongly, e.g. the same schema type was
//!   registered twice, a table got two columns with the same name, or a configuration
//!   file failed to parse or validate.
//! - **State**: an operation was issued out of order, e.g. writing a column before the
//!   table's row identifiers exist, or initializing a dataset twice.
//! - **Consistency**: a write would break a structural invariant, most prominently
//!   `RowCountMismatch` between a new column and the table's established row count.
//! - **UnknownType**: a registry lookup found no factory for a stored type.
//! - **Backend**: an opaque failure surfaced by the container backend. The entity layer
//!   never swallows these; they are propagated verbatim.
//!
//! Invariant checks always run before the backend is touched, so an error from the
//! entity layer never leaves a half-applied write behind. There are no retries and no
//! rollback inside the crate.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type NwbResult<T> = std::result::Result<T, NwbError>;

/// Coarse classification of an [`NwbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Duplicate registrations, duplicate columns, bad configuration values.
    Configuration,
    /// An operation was called before its prerequisite step.
    State,
    /// A write would violate a structural invariant.
    Consistency,
    /// Registry lookup miss.
    UnknownType,
    /// Failure reported by the container backend.
    Backend,
}

#[derive(Error, Debug)]
pub enum NwbError {
    #[error("Type '{namespace}::{type_name}' is already registered")]
    DuplicateRegistration { namespace: String, type_name: String },

    #[error("Table '{table}' already has a column named '{column}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),

    #[error("Invalid state for '{path}': {reason}")]
    InvalidState { path: String, reason: String },

    #[error("Row count mismatch at '{path}': expected {expected} rows, got {actual}")]
    RowCountMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("Type mismatch at '{path}': expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Electrode table '{path}' references more than one electrode group: {groups:?}")]
    MixedElectrodeGroups { path: String, groups: Vec<String> },

    #[error("Region '{path}' references row {index} of a table with {rows} rows")]
    RegionOutOfRange {
        path: String,
        index: i64,
        rows: usize,
    },

    #[error("Extent of '{path}' went backwards from {previous} to {observed}")]
    ExtentRegression {
        path: String,
        previous: usize,
        observed: usize,
    },

    #[error("No factory registered for type '{namespace}::{type_name}'")]
    UnknownType { namespace: String, type_name: String },

    #[error("Backend error at '{path}': {message}")]
    Backend { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "storage_hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

impl NwbError {
    /// Shorthand for a backend failure at `path`.
    pub fn backend(path: impl Into<String>, message: impl Into<String>) -> Self {
        NwbError::Backend {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an ordering/lifecycle violation at `path`.
    pub fn invalid_state(path: impl Into<String>, reason: impl Into<String>) -> Self {
        NwbError::InvalidState {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The taxonomy bucket this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            NwbError::DuplicateRegistration { .. }
            | NwbError::DuplicateColumn { .. }
            | NwbError::Configuration(_)
            | NwbError::Config(_)
            | NwbError::FeatureNotEnabled(_) => ErrorCategory::Configuration,
            NwbError::InvalidState { .. } => ErrorCategory::State,
            NwbError::RowCountMismatch { .. }
            | NwbError::TypeMismatch { .. }
            | NwbError::MixedElectrodeGroups { .. }
            | NwbError::RegionOutOfRange { .. }
            | NwbError::ExtentRegression { .. } => ErrorCategory::Consistency,
            NwbError::UnknownType { .. } => ErrorCategory::UnknownType,
            NwbError::Backend { .. } | NwbError::Io(_) | NwbError::Serialization(_) => {
                ErrorCategory::Backend
            }
            #[cfg(feature = "storage_hdf5")]
            NwbError::Hdf5(_) => ErrorCategory::Backend,
        }
    }

    /// Whether the caller can fix the request and try again within the same session.
    ///
    /// Backend and configuration failures mean the session should be abandoned.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::State | ErrorCategory::Consistency | ErrorCategory::UnknownType
        )
    }
}

impl From<figment::Error> for NwbError {
    fn from(value: figment::Error) -> Self {
        NwbError::Config(Box::new(value))
    }
}
