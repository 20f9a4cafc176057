use crate::error::{NwbError, NwbResult};
use crate::hdmf::data::Data;
use crate::hdmf::HDMF_COMMON;
use crate::io::{AttributeValue, BaseIo, DatasetHandle, DESCRIPTION_ATTR};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};

/// A table column: a dataset with a required, non-empty description.
#[derive(Debug)]
pub struct VectorData<'io> {
    data: Data<'io>,
    description: Option<String>,
}

impl<'io> VectorData<'io> {
    pub fn new(path: &str, io: &'io dyn BaseIo) -> Self {
        Self::with_type(path, io, HDMF_COMMON, "VectorData")
    }

    /// A column subtype with its own schema identity.
    pub fn with_type(
        path: &str,
        io: &'io dyn BaseIo,
        namespace: &'static str,
        type_name: &'static str,
    ) -> Self {
        Self {
            data: Data::with_type(path, io, namespace, type_name),
            description: None,
        }
    }

    /// Binds the dataset and writes its schema attributes and description.
    ///
    /// An empty description is rejected before anything is written.
    pub fn initialize(&mut self, handle: DatasetHandle, description: &str) -> NwbResult<()> {
        if description.trim().is_empty() {
            return Err(NwbError::Configuration(format!(
                "column '{}' needs a non-empty description",
                self.data.path()
            )));
        }
        self.data.initialize(handle)?;
        self.data
            .set_attribute(DESCRIPTION_ATTR, AttributeValue::Str(description.to_string()))?;
        self.description = Some(description.to_string());
        Ok(())
    }

    /// Binds to an existing column and loads its description from storage.
    pub fn attach(&mut self) -> NwbResult<()> {
        self.data.attach()?;
        self.description = self.read_description().ok();
        Ok(())
    }

    /// Description as of the last successful `initialize` or `attach`.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Description as currently stored.
    pub fn read_description(&self) -> NwbResult<String> {
        let value = self.data.io().read_attribute(self.data.path(), DESCRIPTION_ATTR)?;
        value.as_str().map(str::to_owned).ok_or_else(|| NwbError::TypeMismatch {
            path: self.data.path().to_string(),
            expected: "string description".to_string(),
            actual: format!("{:?}", value),
        })
    }

    pub fn data(&self) -> &Data<'io> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Data<'io> {
        &mut self.data
    }
}

impl RegisteredType for VectorData<'_> {
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

impl TypedEntity for VectorData<'_> {
    const NAMESPACE: &'static str = HDMF_COMMON;
    const TYPE_NAME: &'static str = "VectorData";

    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        Entity::VectorData(VectorData::new(path, io))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::MemoryIo;
    use crate::io::{DataType, DatasetConfig, FileMode};

    #[test]
    fn empty_description_is_rejected_before_any_write() {
        let io = MemoryIo::new("v.nwb");
        io.open(FileMode::Overwrite).unwrap();
        let handle = io
            .create_array_dataset(&DatasetConfig::vector(DataType::F64, 0, 4), "/t/x")
            .unwrap();
        let mut column = VectorData::new("/t/x", &io);
        let err = column.initialize(handle.clone(), "  ").unwrap_err();
        assert!(matches!(err, NwbError::Configuration(_)));
        assert!(!io.attribute_exists("/t/x", "neurodata_type"));

        column.initialize(handle, "x position").unwrap();
        assert_eq!(column.description(), Some("x position"));
        assert_eq!(column.read_description().unwrap(), "x position");
        assert_eq!(column.full_type_name(), "hdmf-common::VectorData");
    }

    #[test]
    fn cached_description_survives_external_rewrites() {
        let io = MemoryIo::new("v.nwb");
        io.open(FileMode::Overwrite).unwrap();
        let handle = io
            .create_array_dataset(&DatasetConfig::vector(DataType::F64, 0, 4), "/t/y")
            .unwrap();
        let mut column = VectorData::new("/t/y", &io);
        column.initialize(handle, "first").unwrap();
        io.create_attribute("second".into(), "/t/y", DESCRIPTION_ATTR)
            .unwrap();
        assert_eq!(column.description(), Some("first"));
        assert_eq!(column.read_description().unwrap(), "second");
    }
}
