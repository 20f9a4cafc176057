//! Schema identity shared by every persisted entity.
//!
//! Each entity knows its storage path, the I/O session it writes through, and the
//! `(namespace, type-name)` pair that is persisted alongside it. [`Entity`] is the
//! closed set of entity kinds the registry can construct; custom schema types are
//! represented by the generic [`Container`] or [`Data`] variants carrying their own
//! identity.

use crate::hdmf::container::Container;
use crate::hdmf::data::Data;
use crate::hdmf::table::{DynamicTable, DynamicTableRegion, ElementIdentifiers, VectorData};
use crate::io::{path_name, BaseIo, StorageObjectType};
use crate::nwb::{
    Device, ElectricalSeries, ElectrodeGroup, ElectrodeTable, NwbFile, TimeSeries,
};

/// Capability surface of any persisted entity.
pub trait RegisteredType {
    /// Absolute '/'-delimited storage path.
    fn path(&self) -> &str;

    /// The I/O session this entity writes through.
    fn io(&self) -> &dyn BaseIo;

    fn namespace(&self) -> &str;

    fn type_name(&self) -> &str;

    /// Last component of the path.
    fn name(&self) -> &str {
        path_name(self.path())
    }

    /// `namespace::type-name`.
    fn full_type_name(&self) -> String {
        format!("{}::{}", self.namespace(), self.type_name())
    }

    fn storage_object_type(&self) -> StorageObjectType {
        self.io().storage_object_type(self.path())
    }

    /// Whether the entity has been materialized in storage.
    fn is_initialized(&self) -> bool {
        self.io().object_exists(self.path())
    }
}

/// A type that can be registered by its static schema identity.
pub trait TypedEntity {
    const NAMESPACE: &'static str;
    const TYPE_NAME: &'static str;

    /// Constructs the entity at `path` without touching storage.
    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io>;
}

/// Any entity the registry can construct.
#[derive(Debug)]
pub enum Entity<'io> {
    Container(Container<'io>),
    Data(Data<'io>),
    VectorData(VectorData<'io>),
    ElementIdentifiers(ElementIdentifiers<'io>),
    DynamicTable(DynamicTable<'io>),
    ElectrodeTable(ElectrodeTable<'io>),
    Device(Device<'io>),
    ElectrodeGroup(ElectrodeGroup<'io>),
    DynamicTableRegion(DynamicTableRegion<'io>),
    NwbFile(NwbFile<'io>),
    TimeSeries(TimeSeries<'io>),
    ElectricalSeries(ElectricalSeries<'io>),
}

impl<'io> Entity<'io> {
    /// The entity viewed through its [`RegisteredType`] capabilities.
    pub fn as_registered(&self) -> &dyn RegisteredType {
        match self {
            Entity::Container(e) => e,
            Entity::Data(e) => e,
            Entity::VectorData(e) => e,
            Entity::ElementIdentifiers(e) => e,
            Entity::DynamicTable(e) => e,
            Entity::ElectrodeTable(e) => e,
            Entity::Device(e) => e,
            Entity::ElectrodeGroup(e) => e,
            Entity::DynamicTableRegion(e) => e,
            Entity::NwbFile(e) => e,
            Entity::TimeSeries(e) => e,
            Entity::ElectricalSeries(e) => e,
        }
    }

    /// The table inside `DynamicTable` and `ElectrodeTable` entities.
    pub fn into_dynamic_table(self) -> Option<DynamicTable<'io>> {
        match self {
            Entity::DynamicTable(table) => Some(table),
            Entity::ElectrodeTable(table) => Some(table.into_table()),
            _ => None,
        }
    }

    pub fn into_electrode_table(self) -> Option<ElectrodeTable<'io>> {
        match self {
            Entity::ElectrodeTable(table) => Some(table),
            _ => None,
        }
    }

    pub fn into_electrical_series(self) -> Option<ElectricalSeries<'io>> {
        match self {
            Entity::ElectricalSeries(series) => Some(series),
            _ => None,
        }
    }

    pub fn into_vector_data(self) -> Option<VectorData<'io>> {
        match self {
            Entity::VectorData(column) => Some(column),
            _ => None,
        }
    }
}

impl RegisteredType for Entity<'_> {
    fn path(&self) -> &str {
        self.as_registered().path()
    }

    fn io(&self) -> &dyn BaseIo {
        self.as_registered().io()
    }

    fn namespace(&self) -> &str {
        self.as_registered().namespace()
    }

    fn type_name(&self) -> &str {
        self.as_registered().type_name()
    }
}

macro_rules! impl_into_entity {
    ($($ty:ident),* $(,)?) => {
        $(impl<'io> From<$ty<'io>> for Entity<'io> {
            fn from(value: $ty<'io>) -> Self {
                Entity::$ty(value)
            }
        })*
    };
}

impl_into_entity!(
    Container,
    Data,
    VectorData,
    ElementIdentifiers,
    DynamicTable,
    ElectrodeTable,
    Device,
    ElectrodeGroup,
    DynamicTableRegion,
    NwbFile,
    TimeSeries,
    ElectricalSeries,
);
