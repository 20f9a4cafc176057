//! Tests for deriving the electrode table from a channel list.

use rust_nwb::io::memory::MemoryIo;
use rust_nwb::io::{BaseIo, DataValues, FileMode};
use rust_nwb::nwb::{Device, ElectrodeGroup, ElectrodeTable, ELECTRODE_TABLE_PATH};
use rust_nwb::registry::TypeRegistry;
use rust_nwb::{Channel, NwbError, RegisteredType};

fn open_session() -> MemoryIo {
    let io = MemoryIo::new("electrodes.nwb");
    io.open(FileMode::Overwrite).unwrap();
    io
}

fn channels(group: &str, count: usize, first_global: usize) -> Vec<Channel> {
    (0..count)
        .map(|i| Channel::new(format!("CH{}", i), group, i, first_global + i))
        .collect()
}

fn column_len(io: &MemoryIo, name: &str) -> usize {
    io.dataset_extent(&format!("{}/{}", ELECTRODE_TABLE_PATH, name))
        .unwrap()[0]
}

#[test]
fn test_row_count_equals_channel_count() {
    for count in [0usize, 1, 4, 32] {
        let io = open_session();
        let mut table = ElectrodeTable::new(&io, channels("array0", count, 0));
        table.initialize().unwrap();
        table.add_electrodes().unwrap();

        assert_eq!(table.table().row_count(), count);
        for column in ["id", "group_name", "location", "group"] {
            assert_eq!(column_len(&io, column), count, "column {}", column);
        }
    }
}

#[test]
fn test_columns_are_written_in_fixed_order() {
    let io = open_session();
    let mut table = ElectrodeTable::new(&io, channels("array0", 2, 0));
    table.initialize().unwrap();
    table.add_electrodes().unwrap();

    assert_eq!(
        table.table().read_col_names().unwrap(),
        vec!["group_name", "location", "group"]
    );
    assert_eq!(
        table.table().read_description().unwrap(),
        "metadata about extracellular electrodes"
    );
}

#[test]
fn test_ids_are_global_indices_and_rows_reference_groups() {
    let io = open_session();
    let mut list = channels("shank0", 2, 16);
    list.extend(channels("shank1", 2, 40));
    let mut table = ElectrodeTable::new(&io, list);
    table.initialize().unwrap();
    table.add_electrodes().unwrap();

    assert_eq!(table.table().read_id_column().unwrap(), vec![16, 17, 40, 41]);
    assert_eq!(
        table.table().read_column("group_name").unwrap().as_strings().unwrap(),
        ["shank0", "shank0", "shank1", "shank1"]
    );
    assert_eq!(
        table.table().read_column("location").unwrap(),
        DataValues::Str(vec!["unknown".to_string(); 4])
    );
    assert_eq!(
        table.table().read_column("group").unwrap(),
        DataValues::Reference(vec![
            "/general/extracellular_ephys/shank0".to_string(),
            "/general/extracellular_ephys/shank0".to_string(),
            "/general/extracellular_ephys/shank1".to_string(),
            "/general/extracellular_ephys/shank1".to_string(),
        ])
    );
}

#[test]
fn test_group_path_follows_first_channel() {
    let io = open_session();
    let mut table = ElectrodeTable::new(&io, channels("tetrode3", 4, 12));
    table.initialize().unwrap();
    table.add_electrodes().unwrap();
    assert_eq!(
        table.group_path().unwrap(),
        "/general/extracellular_ephys/tetrode3"
    );
}

#[test]
fn test_empty_channel_list_produces_empty_columns() {
    let io = open_session();
    let mut table = ElectrodeTable::new(&io, Vec::new());
    table.initialize().unwrap();
    table.add_electrodes().unwrap();

    assert_eq!(table.table().row_count(), 0);
    assert!(table.table().read_id_column().unwrap().is_empty());
    assert!(matches!(
        table.group_path(),
        Err(NwbError::InvalidState { .. })
    ));
}

#[test]
fn test_full_extracellular_hierarchy_is_discoverable() {
    let io = open_session();
    let device = Device::new("/general/devices/shank0", &io);
    device.initialize("silicon shank", "acme").unwrap();
    let group = ElectrodeGroup::new("/general/extracellular_ephys/shank0", &io);
    group.initialize("first shank", "CA1", &device).unwrap();

    let mut table = ElectrodeTable::new(&io, channels("shank0", 3, 0));
    table.initialize().unwrap();
    table.add_electrodes().unwrap();
    assert_eq!(table.group_path().unwrap(), group.path());

    let rebuilt = TypeRegistry::global()
        .create_from_stored(ELECTRODE_TABLE_PATH, &io)
        .unwrap();
    assert_eq!(rebuilt.full_type_name(), "core::ElectrodesTable");
    let mut loaded = rebuilt.into_electrode_table().unwrap();
    loaded.load().unwrap();
    assert_eq!(loaded.table().row_count(), 3);
    assert_eq!(loaded.group_path().unwrap(), "/general/extracellular_ephys/shank0");
}
