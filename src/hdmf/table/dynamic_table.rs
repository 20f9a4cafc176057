//! Row/column tables with shared-length columns.
//!
//! A [`DynamicTable`] owns an `id` column of row keys and any number of named
//! [`VectorData`] columns. The row count is established by [`DynamicTable::set_row_ids`]
//! and every column added afterwards must match it. All checks run before the
//! backend is touched, so a rejected column leaves the table exactly as it was.
//!
//! Column order is insertion order and is persisted in the group's `colnames`
//! attribute after every successful column addition.

use super::{ElementIdentifiers, VectorData, COLNAMES_ATTR, ID_COLUMN};
use crate::error::{NwbError, NwbResult};
use crate::hdmf::container::Container;
use crate::hdmf::HDMF_COMMON;
use crate::io::{AttributeValue, BaseIo, DataType, DataValues, DatasetConfig, DESCRIPTION_ATTR};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};
use tracing::{debug, warn};

/// Chunk length used for table datasets unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

#[derive(Debug)]
pub struct DynamicTable<'io> {
    container: Container<'io>,
    description: Option<String>,
    initialized: bool,
    id: Option<ElementIdentifiers<'io>>,
    row_count: usize,
    columns: Vec<VectorData<'io>>,
    column_names: Vec<String>,
    chunk_size: usize,
}

impl<'io> DynamicTable<'io> {
    /// An `hdmf-common::DynamicTable` at `path`.
    pub fn new(path: &str, io: &'io dyn BaseIo) -> Self {
        Self::with_type(path, io, HDMF_COMMON, "DynamicTable")
    }

    /// A table subtype with its own schema identity.
    pub fn with_type(
        path: &str,
        io: &'io dyn BaseIo,
        namespace: &'static str,
        type_name: &'static str,
    ) -> Self {
        Self {
            container: Container::with_type(path, io, namespace, type_name),
            description: None,
            initialized: false,
            id: None,
            row_count: 0,
            columns: Vec::new(),
            column_names: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Chunk length for datasets this table creates.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Creates the table group with its schema attributes and an empty `colnames`.
    pub fn initialize(&mut self, description: &str) -> NwbResult<()> {
        self.container.initialize_typed(Some(description))?;
        self.container
            .set_attribute(COLNAMES_ATTR, AttributeValue::StrList(Vec::new()))?;
        self.description = Some(description.to_string());
        self.initialized = true;
        Ok(())
    }

    fn session(&self) -> &'io dyn BaseIo {
        self.container.session()
    }

    pub(crate) fn require_initialized(&self) -> NwbResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(NwbError::invalid_state(self.path(), "table is not initialized"))
        }
    }

    fn require_ids(&self) -> NwbResult<()> {
        if self.id.is_some() {
            Ok(())
        } else {
            Err(NwbError::invalid_state(
                self.path(),
                "row ids must be set before columns are added",
            ))
        }
    }

    /// Writes the full id sequence and establishes the row count.
    ///
    /// An uninitialized `id` gets an `i64` dataset at its path (or is bound to the one
    /// already stored there).
    ///
    /// Once columns exist the id count is fixed. Ids may be replaced or extended while the
    /// table has no columns, but never shortened: stored datasets only grow.
    pub fn set_row_ids(&mut self, mut id: ElementIdentifiers<'io>, values: &[i64]) -> NwbResult<()> {
        self.require_initialized()?;
        if !self.columns.is_empty() && values.len() != self.row_count {
            warn!(table = %self.path(), expected = self.row_count, actual = values.len(), "Rejected row ids");
            return Err(NwbError::RowCountMismatch {
                path: id.path().to_string(),
                expected: self.row_count,
                actual: values.len(),
            });
        }
        if self.id.is_some() && values.len() < self.row_count {
            return Err(NwbError::RowCountMismatch {
                path: id.path().to_string(),
                expected: self.row_count,
                actual: values.len(),
            });
        }
        let encoded = if id.data().has_handle() {
            id.encode(values)?
        } else {
            if self.session().object_exists(id.path()) {
                id.attach()?;
            } else {
                let config = DatasetConfig::vector(DataType::I64, 0, self.chunk_size);
                let handle = self.session().create_array_dataset(&config, id.path())?;
                id.initialize(handle)?;
            }
            id.encode(values)?
        };
        id.data_mut().write(&encoded)?;
        debug!(table = %self.path(), rows = values.len(), "Set row ids");
        self.row_count = values.len();
        self.id = Some(id);
        Ok(())
    }

    /// `set_row_ids` with an id column at `<table>/id`.
    pub fn set_row_ids_values(&mut self, values: &[i64]) -> NwbResult<()> {
        let id = ElementIdentifiers::new(&self.container.child_path(ID_COLUMN), self.session());
        self.set_row_ids(id, values)
    }

    fn check_new_column(&self, name: &str, description: &str, len: usize) -> NwbResult<()> {
        self.require_initialized()?;
        if self.column_names.iter().any(|c| c == name) || name == ID_COLUMN {
            warn!(table = %self.path(), column = name, "Rejected duplicate column");
            return Err(NwbError::DuplicateColumn {
                table: self.path().to_string(),
                column: name.to_string(),
            });
        }
        self.require_ids()?;
        if len != self.row_count {
            warn!(table = %self.path(), column = name, expected = self.row_count, actual = len, "Rejected column");
            return Err(NwbError::RowCountMismatch {
                path: self.container.child_path(name),
                expected: self.row_count,
                actual: len,
            });
        }
        if description.trim().is_empty() {
            return Err(NwbError::Configuration(format!(
                "column '{}' needs a non-empty description",
                name
            )));
        }
        Ok(())
    }

    fn push_column(&mut self, name: &str, column: VectorData<'io>) -> NwbResult<()> {
        self.column_names.push(name.to_string());
        self.columns.push(column);
        debug!(table = %self.path(), column = name, rows = self.row_count, "Added column");
        self.finalize()
    }

    /// Adds a column and writes its values.
    ///
    /// Fails with `DuplicateColumn`, `InvalidState` (no row ids yet), or
    /// `RowCountMismatch` before anything is written. A column that is already
    /// initialized must carry the same description.
    pub fn add_column(
        &mut self,
        name: &str,
        description: &str,
        mut column: VectorData<'io>,
        values: &DataValues,
    ) -> NwbResult<()> {
        self.check_new_column(name, description, values.len())?;
        let expected_path = self.container.child_path(name);
        if column.path() != expected_path {
            return Err(NwbError::Configuration(format!(
                "column '{}' must live at '{}', not '{}'",
                name,
                expected_path,
                column.path()
            )));
        }
        match column.data().dtype() {
            Some(dtype) if !values.matches(dtype) => {
                return Err(NwbError::TypeMismatch {
                    path: expected_path,
                    expected: dtype.to_string(),
                    actual: values.dtype().to_string(),
                });
            }
            Some(_) => {
                if let Some(stored) = column.description() {
                    if stored != description {
                        return Err(NwbError::Configuration(format!(
                            "column '{}' is described as '{}', not '{}'",
                            name, stored, description
                        )));
                    }
                }
            }
            None => {
                let config = DatasetConfig::vector(values.dtype(), 0, self.chunk_size);
                let handle = self.session().create_array_dataset(&config, &expected_path)?;
                column.initialize(handle, description)?;
            }
        }
        column.data_mut().write(values)?;
        self.push_column(name, column)
    }

    /// `add_column` with a new column at `<table>/<name>`.
    pub fn add_column_values(
        &mut self,
        name: &str,
        description: &str,
        values: &DataValues,
    ) -> NwbResult<()> {
        let column = VectorData::new(&self.container.child_path(name), self.session());
        self.add_column(name, description, column, values)
    }

    /// Adds a column of object references (absolute paths).
    pub fn add_reference_column(
        &mut self,
        name: &str,
        description: &str,
        references: &[String],
    ) -> NwbResult<()> {
        self.check_new_column(name, description, references.len())?;
        let path = self.container.child_path(name);
        let handle = self.session().create_reference_dataset(&path, references)?;
        let mut column = VectorData::new(&path, self.session());
        column.initialize(handle, description)?;
        self.push_column(name, column)
    }

    /// Appends rows to the id column and every column in lockstep.
    ///
    /// `values` holds one block per column in column order, each with `ids.len()`
    /// entries.
    pub fn append_rows(&mut self, ids: &[i64], values: &[DataValues]) -> NwbResult<()> {
        self.require_initialized()?;
        self.require_ids()?;
        if values.len() != self.columns.len() {
            return Err(NwbError::Configuration(format!(
                "table '{}' has {} columns but {} value blocks were given",
                self.path(),
                self.columns.len(),
                values.len()
            )));
        }
        for (column, block) in self.columns.iter().zip(values) {
            if block.len() != ids.len() {
                return Err(NwbError::RowCountMismatch {
                    path: column.path().to_string(),
                    expected: ids.len(),
                    actual: block.len(),
                });
            }
            if let Some(dtype) = column.data().dtype() {
                if !block.matches(dtype) {
                    return Err(NwbError::TypeMismatch {
                        path: column.path().to_string(),
                        expected: dtype.to_string(),
                        actual: block.dtype().to_string(),
                    });
                }
            }
        }
        let id = self
            .id
            .as_mut()
            .ok_or_else(|| NwbError::invalid_state(self.container.path(), "row ids are not set"))?;
        let encoded = id.encode(ids)?;
        id.data_mut().append(&encoded)?;
        for (column, block) in self.columns.iter_mut().zip(values) {
            column.data_mut().append(block)?;
        }
        self.row_count += ids.len();
        debug!(table = %self.path(), appended = ids.len(), rows = self.row_count, "Appended rows");
        Ok(())
    }

    /// Rewrites `colnames` from the in-memory column order.
    pub fn finalize(&self) -> NwbResult<()> {
        self.container.set_attribute(
            COLNAMES_ATTR,
            AttributeValue::StrList(self.column_names.clone()),
        )
    }

    pub fn read_col_names(&self) -> NwbResult<Vec<String>> {
        let value = self.session().read_attribute(self.path(), COLNAMES_ATTR)?;
        value
            .as_str_list()
            .map(<[String]>::to_vec)
            .ok_or_else(|| NwbError::TypeMismatch {
                path: self.path().to_string(),
                expected: "list of column names".to_string(),
                actual: format!("{:?}", value),
            })
    }

    pub fn read_description(&self) -> NwbResult<String> {
        let value = self.session().read_attribute(self.path(), DESCRIPTION_ATTR)?;
        value.as_str().map(str::to_owned).ok_or_else(|| NwbError::TypeMismatch {
            path: self.path().to_string(),
            expected: "string description".to_string(),
            actual: format!("{:?}", value),
        })
    }

    pub fn read_id_column(&self) -> NwbResult<Vec<i64>> {
        ElementIdentifiers::new(&self.container.child_path(ID_COLUMN), self.session()).read_ids()
    }

    pub fn read_column(&self, name: &str) -> NwbResult<DataValues> {
        self.session().read_dataset(&self.container.child_path(name))
    }

    /// Rebuilds ids and columns from storage so a reopened table can be inspected
    /// and appended to.
    pub fn load(&mut self) -> NwbResult<()> {
        let io = self.session();
        let names = self.read_col_names()?;
        let id_path = self.container.child_path(ID_COLUMN);
        let id = if io.object_exists(&id_path) {
            let mut id = ElementIdentifiers::new(&id_path, io);
            id.attach()?;
            Some(id)
        } else {
            None
        };
        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            let mut column = VectorData::new(&self.container.child_path(name), io);
            column.attach()?;
            columns.push(column);
        }
        self.row_count = id.as_ref().map_or(0, |id| id.data().rows());
        self.id = id;
        self.columns = columns;
        self.column_names = names;
        self.description = self.read_description().ok();
        self.initialized = true;
        debug!(table = %self.path(), rows = self.row_count, columns = self.columns.len(), "Loaded table");
        Ok(())
    }

    /// Number of rows established by the id column.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn column(&self, name: &str) -> Option<&VectorData<'io>> {
        self.column_names
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.columns.get(idx))
    }

    pub fn id_column(&self) -> Option<&ElementIdentifiers<'io>> {
        self.id.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn container(&self) -> &Container<'io> {
        &self.container
    }
}

impl RegisteredType for DynamicTable<'_> {
    fn path(&self) -> &str {
        self.container.path()
    }

    fn io(&self) -> &dyn BaseIo {
        self.container.io()
    }

    fn namespace(&self) -> &str {
        self.container.namespace()
    }

    fn type_name(&self) -> &str {
        self.container.type_name()
    }
}

impl TypedEntity for DynamicTable<'_> {
    const NAMESPACE: &'static str = HDMF_COMMON;
    const TYPE_NAME: &'static str = "DynamicTable";

    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        Entity::DynamicTable(DynamicTable::new(path, io))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::MemoryIo;
    use crate::io::FileMode;

    fn session() -> MemoryIo {
        let io = MemoryIo::new("table.nwb");
        io.open(FileMode::Overwrite).unwrap();
        io
    }

    #[test]
    fn columns_require_row_ids() {
        let io = session();
        let mut table = DynamicTable::new("/units", &io);
        table.initialize("sorted units").unwrap();
        let err = table
            .add_column_values("quality", "unit quality", &vec![1.0f64].into())
            .unwrap_err();
        assert!(matches!(err, NwbError::InvalidState { .. }));
        assert!(!io.object_exists("/units/quality"));
    }

    #[test]
    fn uninitialized_table_rejects_row_ids() {
        let io = session();
        let mut table = DynamicTable::new("/units", &io);
        let err = table.set_row_ids_values(&[0, 1]).unwrap_err();
        assert!(matches!(err, NwbError::InvalidState { .. }));
    }

    #[test]
    fn mismatched_column_leaves_table_untouched() {
        let io = session();
        let mut table = DynamicTable::new("/units", &io);
        table.initialize("sorted units").unwrap();
        table.set_row_ids_values(&[0, 1, 2]).unwrap();
        table
            .add_column_values("depth", "depth in um", &vec![10.0f64, 20.0, 30.0].into())
            .unwrap();

        let err = table
            .add_column_values("quality", "unit quality", &vec![1.0f64, 2.0].into())
            .unwrap_err();
        assert!(matches!(
            err,
            NwbError::RowCountMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
        assert_eq!(table.column_names(), &["depth".to_string()]);
        assert!(!io.object_exists("/units/quality"));
        assert_eq!(table.read_col_names().unwrap(), vec!["depth".to_string()]);
    }

    #[test]
    fn duplicate_column_names_are_rejected() {
        let io = session();
        let mut table = DynamicTable::new("/units", &io);
        table.initialize("sorted units").unwrap();
        table.set_row_ids_values(&[7]).unwrap();
        table
            .add_column_values("depth", "depth in um", &vec![1.0f64].into())
            .unwrap();
        let err = table
            .add_column_values("depth", "again", &vec![2.0f64].into())
            .unwrap_err();
        assert!(matches!(err, NwbError::DuplicateColumn { .. }));
        assert_eq!(
            table.read_column("depth").unwrap(),
            DataValues::F64(vec![1.0])
        );
    }

    #[test]
    fn row_ids_cannot_change_length_once_columns_exist() {
        let io = session();
        let mut table = DynamicTable::new("/units", &io);
        table.initialize("sorted units").unwrap();
        table.set_row_ids_values(&[0, 1]).unwrap();
        table
            .add_column_values("depth", "depth in um", &vec![1.0f64, 2.0].into())
            .unwrap();
        let err = table.set_row_ids_values(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, NwbError::RowCountMismatch { .. }));
        table.set_row_ids_values(&[5, 6]).unwrap();
        assert_eq!(table.read_id_column().unwrap(), vec![5, 6]);
    }

    #[test]
    fn append_rows_in_lockstep() {
        let io = session();
        let mut table = DynamicTable::new("/trials", &io).with_chunk_size(4);
        table.initialize("trials").unwrap();
        table.set_row_ids_values(&[0]).unwrap();
        table
            .add_column_values("start_time", "start", &vec![0.0f64].into())
            .unwrap();
        table
            .add_column_values("label", "trial label", &vec!["a"].into())
            .unwrap();

        let err = table
            .append_rows(&[1, 2], &[vec![1.0f64, 2.0].into(), vec!["b"].into()])
            .unwrap_err();
        assert!(matches!(err, NwbError::RowCountMismatch { .. }));
        assert_eq!(table.row_count(), 1);

        table
            .append_rows(&[1, 2], &[vec![1.0f64, 2.0].into(), vec!["b", "c"].into()])
            .unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.read_id_column().unwrap(), vec![0, 1, 2]);
        assert_eq!(
            table.read_column("label").unwrap(),
            DataValues::Str(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    fn reference_columns() {
        let io = session();
        let mut table = DynamicTable::new("/t", &io);
        table.initialize("refs").unwrap();
        table.set_row_ids_values(&[0, 1]).unwrap();
        let refs = vec!["/a".to_string(), "/b".to_string()];
        table
            .add_reference_column("target", "referenced objects", &refs)
            .unwrap();
        assert_eq!(
            table.read_column("target").unwrap(),
            DataValues::Reference(refs)
        );
        assert_eq!(
            table.column("target").and_then(|c| c.description()),
            Some("referenced objects")
        );
    }
}
