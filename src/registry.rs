//! Schema type registry: maps `(namespace, type-name)` to entity factories.
use crate::error::{NwbError, NwbResult};
use crate::hdmf::{
    Container, Data, DynamicTable, DynamicTableRegion, ElementIdentifiers, VectorData,
};
use crate::io::{merge_paths, BaseIo, SearchMode, StorageObjectType, NAMESPACE_ATTR, TYPE_NAME_ATTR};
use crate::nwb::{
    Device, ElectricalSeries, ElectrodeGroup, ElectrodeTable, NwbFile, TimeSeries,
};
use crate::registered_type::{Entity, TypedEntity};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Builds an entity of one registered type at `path`.
pub type EntityFactory = for<'io> fn(&str, &'io dyn BaseIo) -> Entity<'io>;

static GLOBAL: Lazy<TypeRegistry> = Lazy::new(|| {
    let mut registry = TypeRegistry::new();
    registry.register_defaults();
    registry
});

/// Registry of entity factories keyed by schema identity.
///
/// Registration is an explicit step: [`TypeRegistry::new`] starts empty and
/// [`TypeRegistry::register_defaults`] adds every built-in type. Entries are never
/// removed, and a second registration of the same identity is rejected so the first
/// factory always wins.
///
/// # Examples
///
/// ```
/// use rust_nwb::io::memory::MemoryIo;
/// use rust_nwb::registered_type::RegisteredType;
/// use rust_nwb::registry::TypeRegistry;
///
/// let io = MemoryIo::new("example.nwb");
/// let registry = TypeRegistry::global();
/// let entity = registry.create("core", "Device", "/general/devices/shank", &io)?;
/// assert_eq!(entity.full_type_name(), "core::Device");
/// # Ok::<(), rust_nwb::error::NwbError>(())
/// ```
#[derive(Default)]
pub struct TypeRegistry {
    factories: HashMap<(String, String), EntityFactory>,
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.list_types())
            .finish()
    }
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry holding every built-in type.
    ///
    /// Built on first use and read-only afterwards.
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL
    }

    /// Registers every built-in type.
    ///
    /// - `hdmf-common`: Container, Data, VectorData, ElementIdentifiers, DynamicTable,
    ///   DynamicTableRegion
    /// - `core`: NWBFile, Device, ElectrodeGroup, ElectrodesTable, TimeSeries,
    ///   ElectricalSeries
    ///
    /// Types that are already present are left alone, so calling this twice is harmless.
    pub fn register_defaults(&mut self) {
        self.register_default::<Container<'_>>();
        self.register_default::<Data<'_>>();
        self.register_default::<VectorData<'_>>();
        self.register_default::<ElementIdentifiers<'_>>();
        self.register_default::<DynamicTable<'_>>();
        self.register_default::<Device<'_>>();
        self.register_default::<ElectrodeGroup<'_>>();
        self.register_default::<ElectrodeTable<'_>>();
        self.register_default::<DynamicTableRegion<'_>>();
        self.register_default::<NwbFile<'_>>();
        self.register_default::<TimeSeries<'_>>();
        self.register_default::<ElectricalSeries<'_>>();
    }

    fn register_default<T: TypedEntity>(&mut self) {
        if !self.is_registered(T::NAMESPACE, T::TYPE_NAME) {
            self.factories.insert(
                (T::NAMESPACE.to_string(), T::TYPE_NAME.to_string()),
                T::create,
            );
        }
    }

    /// Registers a factory for `(namespace, type_name)`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRegistration` if the identity is already taken. The existing
    /// factory stays in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_nwb::hdmf::Container;
    /// use rust_nwb::registered_type::Entity;
    /// use rust_nwb::registry::TypeRegistry;
    ///
    /// let mut registry = TypeRegistry::new();
    /// registry.register("lab", "Rig", |path, io| {
    ///     Entity::Container(Container::with_type(path, io, "lab", "Rig"))
    /// })?;
    /// assert!(registry.register("lab", "Rig", |path, io| {
    ///     Entity::Container(Container::new(path, io))
    /// }).is_err());
    /// # Ok::<(), rust_nwb::error::NwbError>(())
    /// ```
    pub fn register(
        &mut self,
        namespace: &str,
        type_name: &str,
        factory: EntityFactory,
    ) -> NwbResult<()> {
        let key = (namespace.to_string(), type_name.to_string());
        if self.factories.contains_key(&key) {
            return Err(NwbError::DuplicateRegistration {
                namespace: namespace.to_string(),
                type_name: type_name.to_string(),
            });
        }
        debug!(namespace, type_name, "Registered type");
        self.factories.insert(key, factory);
        Ok(())
    }

    /// Registers `T` under its static identity.
    pub fn register_type<T: TypedEntity>(&mut self) -> NwbResult<()> {
        self.register(T::NAMESPACE, T::TYPE_NAME, T::create)
    }

    /// Constructs the entity registered as `(namespace, type_name)` at `path`.
    ///
    /// No storage access happens here; the entity is bound to `io` only.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` when nothing is registered under that identity.
    pub fn create<'io>(
        &self,
        namespace: &str,
        type_name: &str,
        path: &str,
        io: &'io dyn BaseIo,
    ) -> NwbResult<Entity<'io>> {
        self.factories
            .get(&(namespace.to_string(), type_name.to_string()))
            .map(|factory| factory(path, io))
            .ok_or_else(|| NwbError::UnknownType {
                namespace: namespace.to_string(),
                type_name: type_name.to_string(),
            })
    }

    /// `create` from a `namespace::type-name` string.
    pub fn create_by_full_name<'io>(
        &self,
        full_name: &str,
        path: &str,
        io: &'io dyn BaseIo,
    ) -> NwbResult<Entity<'io>> {
        let (namespace, type_name) = full_name.split_once("::").ok_or_else(|| {
            NwbError::Configuration(format!(
                "'{}' is not a full type name of the form namespace::Type",
                full_name
            ))
        })?;
        self.create(namespace, type_name, path, io)
    }

    /// Reads the stored identity at `path` and constructs the matching entity.
    pub fn create_from_stored<'io>(&self, path: &str, io: &'io dyn BaseIo) -> NwbResult<Entity<'io>> {
        let (namespace, type_name) = stored_identity(io, path)?;
        self.create(&namespace, &type_name, path, io)
    }

    pub fn is_registered(&self, namespace: &str, type_name: &str) -> bool {
        self.factories
            .contains_key(&(namespace.to_string(), type_name.to_string()))
    }

    /// Every registered identity as `namespace::type-name`, sorted.
    pub fn list_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .factories
            .keys()
            .map(|(namespace, type_name)| format!("{}::{}", namespace, type_name))
            .collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// The `(namespace, type-name)` attributes stored at `path`.
pub fn stored_identity(io: &dyn BaseIo, path: &str) -> NwbResult<(String, String)> {
    let read = |name: &str| -> NwbResult<String> {
        let value = io.read_attribute(path, name)?;
        value.as_str().map(str::to_owned).ok_or_else(|| NwbError::TypeMismatch {
            path: path.to_string(),
            expected: format!("string attribute '{}'", name),
            actual: format!("{:?}", value),
        })
    };
    Ok((read(NAMESPACE_ATTR)?, read(TYPE_NAME_ATTR)?))
}

/// Finds typed objects below `start`, returning `path -> namespace::type-name`.
///
/// With [`SearchMode::StopOnType`] the walk does not descend into typed groups;
/// with [`SearchMode::ContinueOnType`] it does. `start` itself is not reported.
pub fn find_owned_types(
    io: &dyn BaseIo,
    start: &str,
    mode: SearchMode,
) -> NwbResult<BTreeMap<String, String>> {
    let mut found = BTreeMap::new();
    let mut pending = vec![crate::io::normalize_path(start)];
    while let Some(group) = pending.pop() {
        for (name, kind) in io.storage_objects(&group)? {
            let child = merge_paths(&group, &name);
            let typed = io.attribute_exists(&child, NAMESPACE_ATTR)
                && io.attribute_exists(&child, TYPE_NAME_ATTR);
            if typed {
                let (namespace, type_name) = stored_identity(io, &child)?;
                found.insert(child.clone(), format!("{}::{}", namespace, type_name));
            }
            if kind == StorageObjectType::Group && (!typed || mode == SearchMode::ContinueOnType) {
                pending.push(child);
            }
        }
    }
    Ok(found)
}
