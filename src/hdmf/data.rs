//! Dataset-backed entities.

use super::HDMF_COMMON;
use crate::error::{NwbError, NwbResult};
use crate::io::{normalize_path, AttributeValue, BaseIo, DataType, DataValues, DatasetHandle};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// A persisted dataset plus its attributes.
///
/// The dataset itself is allocated by the caller (or a table) and handed over with
/// [`Data::initialize`], which may happen exactly once. Appends keep an in-memory
/// cursor so a recording can stream rows without re-reading the extent.
pub struct Data<'io> {
    path: String,
    io: &'io dyn BaseIo,
    namespace: &'static str,
    type_name: &'static str,
    handle: Option<DatasetHandle>,
    attributes: BTreeMap<String, AttributeValue>,
    cursor: usize,
}

impl std::fmt::Debug for Data<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("path", &self.path)
            .field("type", &self.full_type_name())
            .field("handle", &self.handle)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl<'io> Data<'io> {
    /// An `hdmf-common::Data` at `path`.
    pub fn new(path: &str, io: &'io dyn BaseIo) -> Self {
        Self::with_type(path, io, HDMF_COMMON, "Data")
    }

    pub fn with_type(
        path: &str,
        io: &'io dyn BaseIo,
        namespace: &'static str,
        type_name: &'static str,
    ) -> Self {
        Self {
            path: normalize_path(path),
            io,
            namespace,
            type_name,
            handle: None,
            attributes: BTreeMap::new(),
            cursor: 0,
        }
    }

    /// Takes ownership of `handle` and writes the schema attributes.
    ///
    /// Fails with `InvalidState` on a second call, before anything reaches the backend.
    pub fn initialize(&mut self, handle: DatasetHandle) -> NwbResult<()> {
        if self.handle.is_some() {
            return Err(NwbError::invalid_state(&self.path, "dataset is already initialized"));
        }
        if normalize_path(handle.path()) != self.path {
            return Err(NwbError::Configuration(format!(
                "dataset handle for '{}' cannot initialize '{}'",
                handle.path(),
                self.path
            )));
        }
        self.io
            .create_common_nwb_attributes(&self.path, self.namespace, self.type_name, None)?;
        self.cursor = self.io.dataset_extent(&self.path)?.first().copied().unwrap_or(0);
        debug!(path = %self.path, dtype = %handle.dtype(), "Initialized dataset");
        self.handle = Some(handle);
        Ok(())
    }

    /// Binds to a dataset that already exists in storage, e.g. after reopening a file.
    ///
    /// No attributes are written; the append cursor is placed at the current end.
    pub fn attach(&mut self) -> NwbResult<()> {
        if self.handle.is_some() {
            return Err(NwbError::invalid_state(&self.path, "dataset is already initialized"));
        }
        let handle = self.io.dataset_handle(&self.path)?;
        self.cursor = self.io.dataset_extent(&self.path)?.first().copied().unwrap_or(0);
        self.handle = Some(handle);
        Ok(())
    }

    pub fn handle(&self) -> Option<&DatasetHandle> {
        self.handle.as_ref()
    }

    /// Element type of the bound dataset.
    pub fn dtype(&self) -> Option<DataType> {
        self.handle.as_ref().map(DatasetHandle::dtype)
    }

    /// True once a dataset handle has been bound.
    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Rows written through this entity (or present when it was attached).
    pub fn rows(&self) -> usize {
        self.cursor
    }

    fn require_handle(&self) -> NwbResult<&DatasetHandle> {
        self.handle
            .as_ref()
            .ok_or_else(|| NwbError::invalid_state(&self.path, "dataset is not initialized"))
    }

    fn check_dtype(&self, handle: &DatasetHandle, values: &DataValues) -> NwbResult<()> {
        if values.matches(handle.dtype()) {
            return Ok(());
        }
        warn!(path = %self.path, expected = %handle.dtype(), actual = %values.dtype(), "Rejected write");
        Err(NwbError::TypeMismatch {
            path: self.path.clone(),
            expected: handle.dtype().to_string(),
            actual: values.dtype().to_string(),
        })
    }

    fn check_values(&self, handle: &DatasetHandle, values: &DataValues) -> NwbResult<usize> {
        self.check_dtype(handle, values)?;
        if values.len() % handle.row_width() != 0 {
            return Err(NwbError::Configuration(format!(
                "{} values do not form whole rows of width {} for '{}'",
                values.len(),
                handle.row_width(),
                self.path
            )));
        }
        Ok(values.len() / handle.row_width())
    }

    fn ensure_rows(&self, handle: &DatasetHandle, rows: usize) -> NwbResult<()> {
        let mut shape = self.io.dataset_extent(&self.path)?;
        match shape.first_mut() {
            Some(first) if *first < rows => {
                *first = rows;
                self.io.extend_dataset(handle, &shape)
            }
            Some(_) => Ok(()),
            None => Err(NwbError::backend(&self.path, "dataset has no dimensions")),
        }
    }

    /// Writes or overwrites an attribute. Requires a prior `initialize`.
    pub fn set_attribute(&mut self, name: &str, value: AttributeValue) -> NwbResult<()> {
        self.require_handle()?;
        self.io.create_attribute(value.clone(), &self.path, name)?;
        self.attributes.insert(name.to_string(), value);
        Ok(())
    }

    /// Cached value of an attribute set through this entity.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Writes `values` from row 0, growing the dataset if needed.
    pub fn write(&mut self, values: &DataValues) -> NwbResult<()> {
        let handle = self.require_handle()?;
        let rows = self.check_values(handle, values)?;
        if rows == 0 {
            return Ok(());
        }
        self.ensure_rows(handle, rows)?;
        self.io.write_block(handle, 0, values)?;
        trace!(path = %self.path, rows, "Wrote dataset");
        self.cursor = self.cursor.max(rows);
        Ok(())
    }

    /// Appends `values` at the cursor and returns the new row count.
    pub fn append(&mut self, values: &DataValues) -> NwbResult<usize> {
        let handle = self.require_handle()?;
        let rows = self.check_values(handle, values)?;
        if rows == 0 {
            return Ok(self.cursor);
        }
        let end = self.cursor + rows;
        self.ensure_rows(handle, end)?;
        self.io.write_block(handle, self.cursor, values)?;
        trace!(path = %self.path, offset = self.cursor, rows, "Appended rows");
        self.cursor = end;
        Ok(end)
    }

    /// Writes a `shape` block at `offset`, growing axis 0 to cover it.
    ///
    /// Used for partial rows, e.g. one channel column of a multi-channel series. The
    /// cursor moves to the end of the block if that lies beyond it.
    pub fn write_region(
        &mut self,
        offset: &[usize],
        shape: &[usize],
        values: &DataValues,
    ) -> NwbResult<()> {
        let handle = self.require_handle()?;
        self.check_dtype(handle, values)?;
        if shape.iter().product::<usize>() != values.len() {
            return Err(NwbError::Configuration(format!(
                "{} values do not fill a {:?} region of '{}'",
                values.len(),
                shape,
                self.path
            )));
        }
        let end = match (offset.first(), shape.first()) {
            (Some(start), Some(rows)) => start + rows,
            _ => {
                return Err(NwbError::Configuration(format!(
                    "region of '{}' needs at least one dimension",
                    self.path
                )))
            }
        };
        if values.is_empty() {
            return Ok(());
        }
        self.ensure_rows(handle, end)?;
        self.io.write_region(handle, offset, shape, values)?;
        trace!(path = %self.path, ?offset, ?shape, "Wrote region");
        self.cursor = self.cursor.max(end);
        Ok(())
    }

    pub fn read_values(&self) -> NwbResult<DataValues> {
        self.io.read_dataset(&self.path)
    }

    /// Current shape in storage.
    pub fn extent(&self) -> NwbResult<Vec<usize>> {
        self.io.dataset_extent(&self.path)
    }
}

impl RegisteredType for Data<'_> {
    fn path(&self) -> &str {
        &self.path
    }

    fn io(&self) -> &dyn BaseIo {
        self.io
    }

    fn namespace(&self) -> &str {
        self.namespace
    }

    fn type_name(&self) -> &str {
        self.type_name
    }
}

impl TypedEntity for Data<'_> {
    const NAMESPACE: &'static str = HDMF_COMMON;
    const TYPE_NAME: &'static str = "Data";

    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        Entity::Data(Data::new(path, io))
    }
}
