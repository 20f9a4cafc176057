//! Write a table, then reconstruct it generically from stored schema attributes.

use rust_nwb::hdmf::DynamicTable;
use rust_nwb::io::memory::{MemoryIo, MemoryStore};
use rust_nwb::io::{BaseIo, DataValues, FileMode, SearchMode};
use rust_nwb::registry::{find_owned_types, TypeRegistry};
use rust_nwb::RegisteredType;
use tempfile::tempdir;

const TABLE_PATH: &str = "/general/extracellular_ephys/electrodes";

fn write_table(io: &dyn BaseIo) {
    let mut table = DynamicTable::new(TABLE_PATH, io);
    table.initialize("metadata about extracellular electrodes").unwrap();
    table.set_row_ids_values(&[0, 1, 2]).unwrap();
    table
        .add_column_values("group_name", "electrode group name", &vec!["g0", "g0", "g1"].into())
        .unwrap();
    table
        .add_column_values(
            "location",
            "brain region",
            &vec!["unknown", "unknown", "unknown"].into(),
        )
        .unwrap();
}

fn assert_reconstructed(io: &dyn BaseIo) {
    let entity = TypeRegistry::global()
        .create_from_stored(TABLE_PATH, io)
        .unwrap();
    assert_eq!(entity.full_type_name(), "hdmf-common::DynamicTable");

    let mut table = entity.into_dynamic_table().unwrap();
    table.load().unwrap();
    assert_eq!(table.column_names(), ["group_name", "location"]);
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.read_id_column().unwrap(), vec![0, 1, 2]);
    assert_eq!(
        table.read_column("group_name").unwrap(),
        DataValues::from(vec!["g0", "g0", "g1"])
    );
    assert_eq!(
        table.read_column("location").unwrap(),
        DataValues::from(vec!["unknown", "unknown", "unknown"])
    );
    assert_eq!(
        table.column("location").and_then(|c| c.description()),
        Some("brain region")
    );
}

#[test]
fn test_generic_read_reconstructs_table() -> anyhow::Result<()> {
    let io = MemoryIo::new("roundtrip.nwb");
    io.open(FileMode::Overwrite)?;
    write_table(&io);
    assert_reconstructed(&io);
    Ok(())
}

#[test]
fn test_reopened_table_accepts_appends() -> anyhow::Result<()> {
    let io = MemoryIo::new("roundtrip.nwb");
    io.open(FileMode::Overwrite)?;
    write_table(&io);

    let mut table = DynamicTable::new(TABLE_PATH, &io);
    table.load()?;
    table.append_rows(&[3], &[vec!["g1"].into(), vec!["CA1"].into()])?;
    assert_eq!(table.row_count(), 4);
    assert_eq!(io.dataset_extent(&format!("{}/location", TABLE_PATH))?, vec![4]);
    Ok(())
}

#[test]
fn test_saved_image_reloads_into_read_only_session() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let file = dir.path().join("session.json");
    {
        let io = MemoryIo::new("session.nwb");
        io.open(FileMode::Overwrite)?;
        write_table(&io);
        io.close()?;
        io.store().save(&file)?;
    }

    let store = MemoryStore::load(&file)?;
    let io = MemoryIo::with_store("session.nwb", store);
    io.open(FileMode::ReadOnly)?;
    assert_reconstructed(&io);

    let owned = find_owned_types(&io, "/", SearchMode::ContinueOnType)?;
    assert_eq!(
        owned.get(TABLE_PATH).map(String::as_str),
        Some("hdmf-common::DynamicTable")
    );
    assert_eq!(
        owned.get(&format!("{}/group_name", TABLE_PATH)).map(String::as_str),
        Some("hdmf-common::VectorData")
    );
    assert!(io.create_group("/processing").is_err());
    Ok(())
}
