//! Group-backed entities.

use super::HDMF_COMMON;
use crate::error::NwbResult;
use crate::io::{merge_paths, normalize_path, AttributeValue, BaseIo};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};
use tracing::debug;

/// A persisted group that owns child entities under its path.
///
/// The I/O session is borrowed, never owned: dropping a container leaves the file
/// and everything written to it untouched.
pub struct Container<'io> {
    path: String,
    io: &'io dyn BaseIo,
    namespace: &'static str,
    type_name: &'static str,
}

impl std::fmt::Debug for Container<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .field("type", &self.full_type_name())
            .finish()
    }
}

impl<'io> Container<'io> {
    /// An `hdmf-common::Container` at `path`.
    pub fn new(path: &str, io: &'io dyn BaseIo) -> Self {
        Self::with_type(path, io, HDMF_COMMON, "Container")
    }

    /// A container with a custom schema identity.
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
        }
    }

    /// Creates the group. The backend decides whether a second call is an error.
    pub fn initialize(&self) -> NwbResult<()> {
        debug!(path = %self.path, kind = %self.full_type_name(), "Initializing container");
        self.io.create_group(&self.path)
    }

    /// Creates the group and writes the schema attributes.
    pub fn initialize_typed(&self, description: Option<&str>) -> NwbResult<()> {
        self.initialize()?;
        self.io.create_common_nwb_attributes(
            &self.path,
            self.namespace,
            self.type_name,
            description,
        )
    }

    /// Writes an attribute on the container group.
    pub fn set_attribute(&self, name: &str, value: AttributeValue) -> NwbResult<()> {
        self.io.create_attribute(value, &self.path, name)
    }

    /// Path of a child called `name`.
    pub fn child_path(&self, name: &str) -> String {
        merge_paths(&self.path, name)
    }

    /// The borrowed session with its full lifetime, for building children.
    pub fn session(&self) -> &'io dyn BaseIo {
        self.io
    }
}

impl RegisteredType for Container<'_> {
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

impl TypedEntity for Container<'_> {
    const NAMESPACE: &'static str = HDMF_COMMON;
    const TYPE_NAME: &'static str = "Container";

    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        Entity::Container(Container::new(path, io))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NwbError;
    use crate::io::memory::MemoryIo;
    use crate::io::{FileMode, StorageObjectType, NAMESPACE_ATTR};

    #[test]
    fn initialize_creates_group_once() {
        let io = MemoryIo::new("c.nwb");
        io.open(FileMode::Overwrite).unwrap();
        let container = Container::new("/acquisition/", &io);
        assert_eq!(container.path(), "/acquisition");
        assert_eq!(container.name(), "acquisition");
        assert!(!container.is_initialized());

        container.initialize().unwrap();
        assert!(container.is_initialized());
        assert_eq!(container.storage_object_type(), StorageObjectType::Group);
        assert!(!io.attribute_exists("/acquisition", NAMESPACE_ATTR));

        let err = container.initialize().unwrap_err();
        assert!(matches!(err, NwbError::Backend { .. }));
    }

    #[test]
    fn typed_initialization_writes_identity() {
        let io = MemoryIo::new("c.nwb");
        io.open(FileMode::Overwrite).unwrap();
        let container = Container::with_type("/processing", &io, "core", "ProcessingModule");
        container.initialize_typed(Some("spike sorting")).unwrap();
        assert_eq!(container.full_type_name(), "core::ProcessingModule");
        assert_eq!(
            io.read_attribute("/processing", "neurodata_type").unwrap(),
            AttributeValue::Str("ProcessingModule".into())
        );
        assert_eq!(
            io.read_attribute("/processing", "description").unwrap(),
            AttributeValue::Str("spike sorting".into())
        );
        assert!(io.attribute_exists("/processing", "object_id"));
    }
}
