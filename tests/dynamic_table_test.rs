//! Tests for DynamicTable row/column invariants against the in-memory backend.

use rust_nwb::hdmf::table::{DynamicTable, ElementIdentifiers, VectorData, COLNAMES_ATTR};
use rust_nwb::io::memory::MemoryIo;
use rust_nwb::io::{
    AttributeValue, BaseIo, DataType, DataValues, DatasetConfig, FileMode, NAMESPACE_ATTR,
    TYPE_NAME_ATTR,
};
use rust_nwb::registered_type::RegisteredType;
use rust_nwb::NwbError;

fn open_session(name: &str) -> MemoryIo {
    let io = MemoryIo::new(name);
    io.open(FileMode::Overwrite).unwrap();
    io
}

#[test]
fn test_column_order_is_append_order() {
    let io = open_session("order.nwb");
    let mut table = DynamicTable::new("/intervals/trials", &io);
    table.initialize("experimental trials").unwrap();
    table.set_row_ids_values(&[0, 1]).unwrap();

    for name in ["stop_time", "start_time", "condition"] {
        let values: DataValues = if name == "condition" {
            vec!["a", "b"].into()
        } else {
            vec![1.0f64, 2.0].into()
        };
        table.add_column_values(name, name, &values).unwrap();
    }

    assert_eq!(table.column_names(), ["stop_time", "start_time", "condition"]);
    assert_eq!(
        io.read_attribute("/intervals/trials", COLNAMES_ATTR).unwrap(),
        AttributeValue::StrList(vec![
            "stop_time".to_string(),
            "start_time".to_string(),
            "condition".to_string()
        ])
    );
}

#[test]
fn test_every_column_tracks_row_count() {
    let io = open_session("rows.nwb");
    let mut table = DynamicTable::new("/units", &io);
    table.initialize("sorted units").unwrap();
    table.set_row_ids_values(&[10, 11, 12]).unwrap();
    table
        .add_column_values("depth", "depth in um", &vec![5.0f64, 6.0, 7.0].into())
        .unwrap();
    table
        .add_column_values("quality", "curation label", &vec!["good", "mua", "good"].into())
        .unwrap();

    table
        .append_rows(
            &[13, 14],
            &[vec![8.0f64, 9.0].into(), vec!["noise", "good"].into()],
        )
        .unwrap();

    assert_eq!(table.row_count(), 5);
    assert_eq!(io.dataset_extent("/units/id").unwrap(), vec![5]);
    assert_eq!(io.dataset_extent("/units/depth").unwrap(), vec![5]);
    assert_eq!(io.dataset_extent("/units/quality").unwrap(), vec![5]);
    assert_eq!(table.read_id_column().unwrap(), vec![10, 11, 12, 13, 14]);
}

#[test]
fn test_append_rows_checks_before_writing() {
    let io = open_session("append.nwb");
    let mut table = DynamicTable::new("/units", &io);
    table.initialize("sorted units").unwrap();
    table.set_row_ids_values(&[0]).unwrap();
    table
        .add_column_values("depth", "depth in um", &vec![1.0f64].into())
        .unwrap();

    let err = table
        .append_rows(&[1, 2], &[vec![2.0f64].into()])
        .unwrap_err();
    assert!(matches!(err, NwbError::RowCountMismatch { .. }));

    let err = table
        .append_rows(&[1], &[vec![2i32].into()])
        .unwrap_err();
    assert!(matches!(err, NwbError::TypeMismatch { .. }));

    let err = table.append_rows(&[1], &[]).unwrap_err();
    assert!(matches!(err, NwbError::Configuration(_)));

    assert_eq!(table.row_count(), 1);
    assert_eq!(io.dataset_extent("/units/id").unwrap(), vec![1]);
}

#[test]
fn test_duplicate_and_reserved_column_names() {
    let io = open_session("dup.nwb");
    let mut table = DynamicTable::new("/units", &io);
    table.initialize("sorted units").unwrap();
    table.set_row_ids_values(&[0]).unwrap();
    table
        .add_column_values("depth", "depth in um", &vec![1.0f64].into())
        .unwrap();

    let err = table
        .add_column_values("depth", "again", &vec![2.0f64].into())
        .unwrap_err();
    assert!(matches!(err, NwbError::DuplicateColumn { .. }));

    let err = table
        .add_column_values("id", "shadowing the ids", &vec![2.0f64].into())
        .unwrap_err();
    assert!(matches!(err, NwbError::DuplicateColumn { .. }));
    assert_eq!(table.column_names().len(), 1);
}

#[test]
fn test_caller_supplied_id_and_column_datasets() {
    let io = open_session("explicit.nwb");
    let mut table = DynamicTable::new("/general/extracellular_ephys/electrodes", &io);
    table.initialize("electrodes").unwrap();

    let id_path = "/general/extracellular_ephys/electrodes/id";
    let handle = io
        .create_array_dataset(&DatasetConfig::vector(DataType::I32, 0, 64), id_path)
        .unwrap();
    let mut id = ElementIdentifiers::new(id_path, &io);
    id.initialize(handle).unwrap();
    table.set_row_ids(id, &[3, 4]).unwrap();
    assert_eq!(
        io.read_dataset(id_path).unwrap(),
        DataValues::I32(vec![3, 4])
    );

    let column_path = "/general/extracellular_ephys/electrodes/x";
    let handle = io
        .create_array_dataset(&DatasetConfig::vector(DataType::F32, 0, 64), column_path)
        .unwrap();
    let mut column = VectorData::new(column_path, &io);
    column.initialize(handle, "x coordinate").unwrap();
    table
        .add_column("x", "x coordinate", column, &vec![0.5f32, 1.5].into())
        .unwrap();

    let stored = table.column("x").unwrap();
    assert_eq!(stored.description(), Some("x coordinate"));
    assert_eq!(stored.full_type_name(), "hdmf-common::VectorData");

    // A column whose path is not under the table is refused
    let mut stray = VectorData::new("/elsewhere/y", &io);
    let handle = io
        .create_array_dataset(&DatasetConfig::vector(DataType::F32, 0, 64), "/elsewhere/y")
        .unwrap();
    stray.initialize(handle, "y coordinate").unwrap();
    let err = table
        .add_column("y", "y coordinate", stray, &vec![0.0f32, 0.0].into())
        .unwrap_err();
    assert!(matches!(err, NwbError::Configuration(_)));
}

#[test]
fn test_schema_attributes_on_every_object() {
    let io = open_session("attrs.nwb");
    let mut table = DynamicTable::new("/units", &io);
    table.initialize("sorted units").unwrap();
    table.set_row_ids_values(&[0]).unwrap();
    table
        .add_column_values("depth", "depth in um", &vec![1.0f64].into())
        .unwrap();

    for (path, type_name) in [
        ("/units", "DynamicTable"),
        ("/units/id", "ElementIdentifiers"),
        ("/units/depth", "VectorData"),
    ] {
        assert_eq!(
            io.read_attribute(path, NAMESPACE_ATTR).unwrap(),
            AttributeValue::Str("hdmf-common".to_string())
        );
        assert_eq!(
            io.read_attribute(path, TYPE_NAME_ATTR).unwrap(),
            AttributeValue::Str(type_name.to_string())
        );
    }
}

#[test]
fn test_shrinking_row_ids_is_rejected() {
    let io = open_session("shrink.nwb");
    let mut table = DynamicTable::new("/units", &io);
    table.initialize("sorted units").unwrap();
    table.set_row_ids_values(&[0, 1, 2]).unwrap();
    let err = table.set_row_ids_values(&[0]).unwrap_err();
    assert!(matches!(
        err,
        NwbError::RowCountMismatch {
            expected: 3,
            actual: 1,
            ..
        }
    ));
    assert_eq!(table.row_count(), 3);
}

#[test]
fn test_initialized_column_keeps_its_description() {
    let io = open_session("described.nwb");
    let mut table = DynamicTable::new("/units", &io);
    table.initialize("sorted units").unwrap();
    table.set_row_ids_values(&[0, 1]).unwrap();

    let path = "/units/depth";
    let handle = io
        .create_array_dataset(&DatasetConfig::vector(DataType::F64, 0, 16), path)
        .unwrap();
    let mut column = VectorData::new(path, &io);
    column.initialize(handle, "depth in um").unwrap();
    let err = table
        .add_column("depth", "depth in mm", column, &vec![1.0f64, 2.0].into())
        .unwrap_err();
    assert!(matches!(err, NwbError::Configuration(_)));
    assert!(table.column_names().is_empty());
    assert_eq!(io.dataset_extent(path).unwrap(), vec![0]);
}
