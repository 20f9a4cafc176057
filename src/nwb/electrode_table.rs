//! The extracellular electrode table.
//!
//! Rows are derived one to one from the recording's channel list: the electrode
//! number is the channel's global index, and each row carries the channel's group
//! name, a placeholder location, and a reference to the electrode group object.

use super::CORE;
use crate::channel::Channel;
use crate::error::{NwbError, NwbResult};
use crate::hdmf::table::{DynamicTable, ElementIdentifiers, VectorData, ID_COLUMN};
use crate::io::{merge_paths, BaseIo, DataType, DataValues, DatasetConfig};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Where the electrode table lives in an NWB file.
pub const ELECTRODE_TABLE_PATH: &str = "/general/extracellular_ephys/electrodes";
/// Parent of every electrode group.
pub const ELECTRODE_GROUP_ROOT: &str = "/general/extracellular_ephys";

const TABLE_DESCRIPTION: &str = "metadata about extracellular electrodes";
const UNKNOWN_LOCATION: &str = "unknown";
/// Maximum byte length of group names and locations.
const NAME_LENGTH: usize = 250;

#[derive(Debug)]
pub struct ElectrodeTable<'io> {
    table: DynamicTable<'io>,
    channels: Option<Vec<Channel>>,
    group_references: Vec<String>,
}

impl<'io> ElectrodeTable<'io> {
    /// A table at the standard location.
    pub fn new(io: &'io dyn BaseIo, channels: Vec<Channel>) -> Self {
        Self::with_path(ELECTRODE_TABLE_PATH, io, channels)
    }

    pub fn with_path(path: &str, io: &'io dyn BaseIo, channels: Vec<Channel>) -> Self {
        Self {
            table: DynamicTable::with_type(path, io, CORE, "ElectrodesTable"),
            channels: Some(channels),
            group_references: Vec::new(),
        }
    }

    pub fn initialize(&mut self) -> NwbResult<()> {
        self.table.initialize(TABLE_DESCRIPTION)
    }

    /// Consumes the channel list and writes ids, `group_name`, `location`, and `group`.
    ///
    /// May be called once; an empty channel list produces a zero-row table. A rejected
    /// call writes nothing and keeps the channels pending.
    pub fn add_electrodes(&mut self) -> NwbResult<()> {
        let channels = self.channels.as_deref().ok_or_else(|| {
            NwbError::invalid_state(self.table.path(), "electrodes have already been added")
        })?;
        self.table.require_initialized()?;
        check_channels(self.table.path(), channels)?;
        let channels = self.channels.take().unwrap_or_default();

        let mut group_references = Vec::with_capacity(channels.len());
        let mut group_names = Vec::with_capacity(channels.len());
        let mut electrode_numbers = Vec::with_capacity(channels.len());
        let mut locations = Vec::with_capacity(channels.len());
        for channel in &channels {
            group_references.push(merge_paths(ELECTRODE_GROUP_ROOT, &channel.group_name));
            group_names.push(channel.group_name.clone());
            electrode_numbers.push(channel.global_index as i64);
            locations.push(UNKNOWN_LOCATION.to_string());
        }

        let io = self.table.container().session();
        let chunk = self.table.chunk_size();

        let id_path = merge_paths(self.table.path(), ID_COLUMN);
        let mut id = ElementIdentifiers::new(&id_path, io);
        let handle = io.create_array_dataset(&DatasetConfig::vector(DataType::I32, 0, chunk), &id_path)?;
        id.initialize(handle)?;
        self.table.set_row_ids(id, &electrode_numbers)?;

        for (name, description, values) in [
            (
                "group_name",
                "the name of the ElectrodeGroup this electrode is a part of",
                group_names,
            ),
            (
                "location",
                "the location of channel within the subject e.g. brain region",
                locations,
            ),
        ] {
            let path = merge_paths(self.table.path(), name);
            let mut column = VectorData::new(&path, io);
            let handle = io.create_array_dataset(
                &DatasetConfig::vector(DataType::FixedStr(NAME_LENGTH), 0, chunk),
                &path,
            )?;
            column.initialize(handle, description)?;
            self.table
                .add_column(name, description, column, &DataValues::Str(values))?;
        }

        self.table.add_reference_column(
            "group",
            "a reference to the ElectrodeGroup this electrode is a part of",
            &group_references,
        )?;
        info!(table = %self.table.path(), electrodes = channels.len(), "Added electrodes");
        self.group_references = group_references;
        Ok(())
    }

    /// The electrode group shared by every row.
    ///
    /// Fails with `InvalidState` for a table without rows and `MixedElectrodeGroups`
    /// when rows reference different groups.
    pub fn group_path(&self) -> NwbResult<&str> {
        let first = self.group_references.first().ok_or_else(|| {
            NwbError::invalid_state(self.table.path(), "electrode table has no rows")
        })?;
        if self.group_references.iter().any(|r| r != first) {
            let groups: BTreeSet<&String> = self.group_references.iter().collect();
            return Err(NwbError::MixedElectrodeGroups {
                path: self.table.path().to_string(),
                groups: groups.into_iter().cloned().collect(),
            });
        }
        Ok(first.as_str())
    }

    /// Rebuilds the table and its group references from storage.
    pub fn load(&mut self) -> NwbResult<()> {
        self.table.load()?;
        self.group_references = match self.table.read_column("group") {
            Ok(values) => values.as_strings().map(<[String]>::to_vec).unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        self.channels = None;
        debug!(table = %self.table.path(), rows = self.table.row_count(), "Loaded electrode table");
        Ok(())
    }

    /// Channels not yet written by `add_electrodes`.
    pub fn pending_channels(&self) -> Option<&[Channel]> {
        self.channels.as_deref()
    }

    pub fn table(&self) -> &DynamicTable<'io> {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut DynamicTable<'io> {
        &mut self.table
    }

    pub fn into_table(self) -> DynamicTable<'io> {
        self.table
    }
}

/// Rejects channels whose group name or global index cannot be stored.
fn check_channels(table: &str, channels: &[Channel]) -> NwbResult<()> {
    for channel in channels {
        if channel.group_name.len() > NAME_LENGTH {
            return Err(NwbError::TypeMismatch {
                path: merge_paths(table, "group_name"),
                expected: DataType::FixedStr(NAME_LENGTH).to_string(),
                actual: format!("group name of {} bytes", channel.group_name.len()),
            });
        }
        if i32::try_from(channel.global_index).is_err() {
            return Err(NwbError::TypeMismatch {
                path: merge_paths(table, ID_COLUMN),
                expected: DataType::I32.to_string(),
                actual: format!("electrode number {}", channel.global_index),
            });
        }
    }
    Ok(())
}

impl RegisteredType for ElectrodeTable<'_> {
    fn path(&self) -> &str {
        self.table.path()
    }

    fn io(&self) -> &dyn BaseIo {
        self.table.io()
    }

    fn namespace(&self) -> &str {
        self.table.namespace()
    }

    fn type_name(&self) -> &str {
        self.table.type_name()
    }
}

impl TypedEntity for ElectrodeTable<'_> {
    const NAMESPACE: &'static str = CORE;
    const TYPE_NAME: &'static str = "ElectrodesTable";

    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        Entity::ElectrodeTable(ElectrodeTable::with_path(path, io, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::MemoryIo;
    use crate::io::FileMode;

    fn session() -> MemoryIo {
        let io = MemoryIo::new("electrodes.nwb");
        io.open(FileMode::Overwrite).unwrap();
        io
    }

    #[test]
    fn add_electrodes_consumes_channels_once() {
        let io = session();
        let mut table = ElectrodeTable::new(&io, vec![Channel::new("ch0", "array0", 0, 0)]);
        table.initialize().unwrap();
        table.add_electrodes().unwrap();
        assert!(table.pending_channels().is_none());
        let err = table.add_electrodes().unwrap_err();
        assert!(matches!(err, NwbError::InvalidState { .. }));
        assert_eq!(table.table().row_count(), 1);
    }

    #[test]
    fn group_path_of_homogeneous_table() {
        let io = session();
        let channels = vec![
            Channel::new("ch0", "array0", 0, 0),
            Channel::new("ch1", "array0", 1, 1),
        ];
        let mut table = ElectrodeTable::new(&io, channels);
        table.initialize().unwrap();
        table.add_electrodes().unwrap();
        assert_eq!(
            table.group_path().unwrap(),
            "/general/extracellular_ephys/array0"
        );
    }

    #[test]
    fn group_path_rejects_mixed_groups_and_empty_tables() {
        let io = session();
        let channels = vec![
            Channel::new("ch0", "array0", 0, 0),
            Channel::new("ch1", "array1", 0, 1),
        ];
        let mut table = ElectrodeTable::new(&io, channels);
        table.initialize().unwrap();
        table.add_electrodes().unwrap();
        match table.group_path() {
            Err(NwbError::MixedElectrodeGroups { groups, .. }) => assert_eq!(groups.len(), 2),
            other => panic!("unexpected result: {:?}", other),
        }

        let io = session();
        let mut empty = ElectrodeTable::new(&io, Vec::new());
        empty.initialize().unwrap();
        empty.add_electrodes().unwrap();
        assert!(matches!(
            empty.group_path(),
            Err(NwbError::InvalidState { .. })
        ));
    }

    #[test]
    fn long_group_names_are_rejected() {
        let io = session();
        let mut table = ElectrodeTable::new(&io, vec![Channel::new("ch0", "g".repeat(300), 0, 0)]);
        table.initialize().unwrap();
        let err = table.add_electrodes().unwrap_err();
        assert!(matches!(err, NwbError::TypeMismatch { .. }));
        assert!(!io.object_exists("/general/extracellular_ephys/electrodes/id"));
        assert_eq!(table.pending_channels().map(<[Channel]>::len), Some(1));
    }

    #[test]
    fn oversized_electrode_numbers_are_rejected() {
        let io = session();
        let index = i32::MAX as usize + 1;
        let mut table = ElectrodeTable::new(&io, vec![Channel::new("ch0", "array0", 0, index)]);
        table.initialize().unwrap();
        let err = table.add_electrodes().unwrap_err();
        assert!(matches!(err, NwbError::TypeMismatch { .. }));
        assert!(!io.object_exists("/general/extracellular_ephys/electrodes/id"));
        assert!(table.pending_channels().is_some());
    }

    #[test]
    fn uninitialized_table_writes_nothing_and_recovers() {
        let io = session();
        let mut table = ElectrodeTable::new(&io, vec![Channel::new("ch0", "array0", 0, 0)]);
        let err = table.add_electrodes().unwrap_err();
        assert!(matches!(err, NwbError::InvalidState { .. }));
        assert!(!io.object_exists(ELECTRODE_TABLE_PATH));
        assert!(table.pending_channels().is_some());

        table.initialize().unwrap();
        table.add_electrodes().unwrap();
        assert_eq!(table.table().row_count(), 1);
        assert_eq!(table.table().read_id_column().unwrap(), vec![0]);
    }
}
