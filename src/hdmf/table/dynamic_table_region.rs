//! Columns whose values are row indices into another table.

use super::{VectorData, ID_COLUMN};
use crate::error::{NwbError, NwbResult};
use crate::hdmf::HDMF_COMMON;
use crate::io::{merge_paths, AttributeValue, BaseIo, DataValues, DatasetHandle};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};
use tracing::debug;

/// Attribute referencing the table a region indexes into.
pub const TABLE_ATTR: &str = "table";

/// A [`VectorData`] of row indices plus a `table` reference attribute.
///
/// Every index must address an existing row of the referenced table, whose row count
/// is read from the table's `id` dataset.
#[derive(Debug)]
pub struct DynamicTableRegion<'io> {
    column: VectorData<'io>,
    table: Option<String>,
}

impl<'io> DynamicTableRegion<'io> {
    pub fn new(path: &str, io: &'io dyn BaseIo) -> Self {
        Self {
            column: VectorData::with_type(path, io, HDMF_COMMON, "DynamicTableRegion"),
            table: None,
        }
    }

    /// Binds an integer dataset, writes the description and the `table` reference.
    pub fn initialize(
        &mut self,
        handle: DatasetHandle,
        description: &str,
        table_path: &str,
    ) -> NwbResult<()> {
        if !handle.dtype().is_signed_integer() {
            return Err(NwbError::TypeMismatch {
                path: self.path().to_string(),
                expected: "signed integer".to_string(),
                actual: handle.dtype().to_string(),
            });
        }
        self.column.initialize(handle, description)?;
        self.column
            .data_mut()
            .set_attribute(TABLE_ATTR, AttributeValue::Reference(table_path.to_string()))?;
        self.table = Some(table_path.to_string());
        Ok(())
    }

    /// Binds to a stored region and reads back its table reference.
    pub fn attach(&mut self) -> NwbResult<()> {
        self.column.attach()?;
        self.table = Some(self.read_table_path()?);
        Ok(())
    }

    /// Rows currently present in the referenced table.
    pub fn table_rows(&self) -> NwbResult<usize> {
        let table = self.table.as_deref().ok_or_else(|| {
            NwbError::invalid_state(self.path(), "region is not bound to a table")
        })?;
        let extent = self.io().dataset_extent(&merge_paths(table, ID_COLUMN))?;
        Ok(extent.first().copied().unwrap_or(0))
    }

    /// Replaces the stored indices.
    ///
    /// Fails with `RegionOutOfRange` before anything is written if an index does not
    /// address a row of the referenced table.
    pub fn set_rows(&mut self, rows: &[i64]) -> NwbResult<()> {
        let available = self.table_rows()?;
        if let Some(&index) = rows
            .iter()
            .find(|&&r| usize::try_from(r).map_or(true, |r| r >= available))
        {
            return Err(NwbError::RegionOutOfRange {
                path: self.path().to_string(),
                index,
                rows: available,
            });
        }
        let data = self.column.data_mut();
        let dtype = data
            .dtype()
            .ok_or_else(|| NwbError::invalid_state(data.path(), "dataset is not initialized"))?;
        let encoded = DataValues::cast_integers(rows, dtype).ok_or_else(|| NwbError::TypeMismatch {
            path: data.path().to_string(),
            expected: dtype.to_string(),
            actual: "i64 row indices out of range".to_string(),
        })?;
        data.write(&encoded)?;
        debug!(path = %self.path(), rows = rows.len(), "Wrote table region");
        Ok(())
    }

    pub fn read_rows(&self) -> NwbResult<Vec<i64>> {
        let values = self.column.data().read_values()?;
        values.to_i64_vec().ok_or_else(|| NwbError::TypeMismatch {
            path: self.path().to_string(),
            expected: "signed integer".to_string(),
            actual: values.dtype().to_string(),
        })
    }

    pub fn read_table_path(&self) -> NwbResult<String> {
        let value = self.io().read_attribute(self.path(), TABLE_ATTR)?;
        value.as_str().map(str::to_owned).ok_or_else(|| NwbError::TypeMismatch {
            path: self.path().to_string(),
            expected: "object reference".to_string(),
            actual: format!("{:?}", value),
        })
    }

    /// Path of the referenced table once bound.
    pub fn table_path(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn column(&self) -> &VectorData<'io> {
        &self.column
    }
}

impl RegisteredType for DynamicTableRegion<'_> {
    fn path(&self) -> &str {
        self.column.path()
    }

    fn io(&self) -> &dyn BaseIo {
        self.column.io()
    }

    fn namespace(&self) -> &str {
        self.column.namespace()
    }

    fn type_name(&self) -> &str {
        self.column.type_name()
    }
}

impl TypedEntity for DynamicTableRegion<'_> {
    const NAMESPACE: &'static str = HDMF_COMMON;
    const TYPE_NAME: &'static str = "DynamicTableRegion";

    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        Entity::DynamicTableRegion(DynamicTableRegion::new(path, io))
    }
}
