use crate::error::{NwbError, NwbResult};
use crate::hdmf::data::Data;
use crate::hdmf::HDMF_COMMON;
use crate::io::{BaseIo, DataValues, DatasetHandle};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};

/// Signed-integer row keys of a table.
#[derive(Debug)]
pub struct ElementIdentifiers<'io> {
    data: Data<'io>,
}

impl<'io> ElementIdentifiers<'io> {
    pub fn new(path: &str, io: &'io dyn BaseIo) -> Self {
        Self {
            data: Data::with_type(path, io, HDMF_COMMON, "ElementIdentifiers"),
        }
    }

    /// Binds the dataset; its element type must be a signed integer.
    pub fn initialize(&mut self, handle: DatasetHandle) -> NwbResult<()> {
        if !handle.dtype().is_signed_integer() {
            return Err(NwbError::TypeMismatch {
                path: self.data.path().to_string(),
                expected: "signed integer".to_string(),
                actual: handle.dtype().to_string(),
            });
        }
        self.data.initialize(handle)
    }

    pub fn attach(&mut self) -> NwbResult<()> {
        self.data.attach()
    }

    /// Converts `ids` to the bound dataset's integer width.
    pub fn encode(&self, ids: &[i64]) -> NwbResult<DataValues> {
        let dtype = self
            .data
            .dtype()
            .ok_or_else(|| NwbError::invalid_state(self.data.path(), "dataset is not initialized"))?;
        DataValues::cast_integers(ids, dtype).ok_or_else(|| NwbError::TypeMismatch {
            path: self.data.path().to_string(),
            expected: dtype.to_string(),
            actual: "i64 row ids out of range".to_string(),
        })
    }

    /// Reads every stored id widened to `i64`.
    pub fn read_ids(&self) -> NwbResult<Vec<i64>> {
        let values = self.data.read_values()?;
        values.to_i64_vec().ok_or_else(|| NwbError::TypeMismatch {
            path: self.data.path().to_string(),
            expected: "signed integer".to_string(),
            actual: values.dtype().to_string(),
        })
    }

    pub fn data(&self) -> &Data<'io> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Data<'io> {
        &mut self.data
    }
}

impl RegisteredType for ElementIdentifiers<'_> {
    fn path(&self) -> &str {
        self.data.path()
    }

    fn io(&self) -> &dyn BaseIo {
        self.data.io()
    }

    fn namespace(&self) -> &str {
        self.data.namespace()
    }

    fn type_name(&self) -> &str {
        self.data.type_name()
    }
}

impl TypedEntity for ElementIdentifiers<'_> {
    const NAMESPACE: &'static str = HDMF_COMMON;
    const TYPE_NAME: &'static str = "ElementIdentifiers";

    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        Entity::ElementIdentifiers(ElementIdentifiers::new(path, io))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::MemoryIo;
    use crate::io::{DataType, DatasetConfig, FileMode};

    #[test]
    fn rejects_non_integer_datasets() {
        let io = MemoryIo::new("ids.nwb");
        io.open(FileMode::Overwrite).unwrap();
        let handle = io
            .create_array_dataset(&DatasetConfig::vector(DataType::F32, 0, 4), "/t/id")
            .unwrap();
        let mut ids = ElementIdentifiers::new("/t/id", &io);
        let err = ids.initialize(handle).unwrap_err();
        assert!(matches!(err, NwbError::TypeMismatch { .. }));
        assert!(!ids.data().has_handle());
    }

    #[test]
    fn encodes_to_the_dataset_width() {
        let io = MemoryIo::new("ids.nwb");
        io.open(FileMode::Overwrite).unwrap();
        let handle = io
            .create_array_dataset(&DatasetConfig::vector(DataType::I32, 0, 4), "/t/id")
            .unwrap();
        let mut ids = ElementIdentifiers::new("/t/id", &io);
        ids.initialize(handle).unwrap();
        let encoded = ids.encode(&[0, 1, 2]).unwrap();
        assert_eq!(encoded, DataValues::I32(vec![0, 1, 2]));
        ids.data_mut().write(&encoded).unwrap();
        assert_eq!(ids.read_ids().unwrap(), vec![0, 1, 2]);
        assert!(ids.encode(&[i64::MAX]).is_err());
    }
}
