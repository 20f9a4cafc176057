//! Single-writer / multiple-reader protocol tests over the in-memory backend.

use rust_nwb::io::memory::{MemoryIo, MemoryStore, MemorySwmrReader};
use rust_nwb::io::swmr::{ExtentMonitor, SwmrReader};
use rust_nwb::io::{BaseIo, DataType, DataValues, DatasetConfig};
use rust_nwb::nwb::{ElectricalSeries, NwbFile};
use rust_nwb::{Channel, NwbError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SERIES_PATH: &str = "/acquisition/tetrode0";
const DATA_PATH: &str = "/acquisition/tetrode0/data";
const TIMESTAMPS_PATH: &str = "/acquisition/tetrode0/timestamps";

/// Writer session holding one two-channel I16 electrical series, already in SWMR mode.
fn recording_session(store: Arc<MemoryStore>) -> MemoryIo {
    let io = MemoryIo::with_store("swmr.nwb", store);
    {
        let mut file = NwbFile::new("swmr-session", &io).with_chunk_size(1024);
        file.initialize().unwrap();
        let channels = vec![
            Channel::new("CH0", "tetrode0", 0, 0),
            Channel::new("CH1", "tetrode0", 1, 1),
        ];
        file.create_electrical_series(&[channels], DataType::I16)
            .unwrap();
        file.start_recording().unwrap();
    }
    io
}

fn attached_series(io: &MemoryIo) -> ElectricalSeries<'_> {
    let mut series = ElectricalSeries::new(SERIES_PATH, io);
    series.load().unwrap();
    series
}

#[test]
fn test_reader_extents_are_monotonic_committed_sizes() {
    let store = MemoryStore::new();
    let io = recording_session(Arc::clone(&store));

    let mut reader = MemorySwmrReader::new(Arc::clone(&store));
    reader.open_dataset(DATA_PATH).unwrap();
    assert_eq!(reader.extent(DATA_PATH).unwrap(), vec![0, 2]);

    let writer = thread::spawn(move || {
        let mut series = attached_series(&io);
        for target in [2usize, 5, 9] {
            let start = series.samples_recorded()[0];
            // Interleaved frames: channel 0 counts up, channel 1 counts down
            let frames: Vec<i16> = (start..target)
                .flat_map(|v| [v as i16, -(v as i16)])
                .collect();
            let timestamps: Vec<f64> = (start..target).map(|v| v as f64 / 30_000.0).collect();
            series
                .append_frames(&frames.into(), Some(&timestamps))
                .unwrap();
            io.flush().unwrap();
            thread::sleep(Duration::from_millis(2));
        }
        io.stop_recording().unwrap();
        assert!(!io.is_open());
    });

    let mut monitor = ExtentMonitor::new(DATA_PATH);
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let observed = monitor.sample(&mut reader).unwrap();
        if observed == 9 {
            break;
        }
        assert!(Instant::now() < deadline, "writer never reached 9 rows");
        thread::yield_now();
    }
    writer.join().unwrap();

    let samples = monitor.samples();
    assert!(samples.windows(2).all(|w| w[0] <= w[1]));
    assert!(samples.iter().all(|s| [0, 2, 5, 9].contains(s)));
    assert_eq!(
        reader.read(DATA_PATH).unwrap(),
        DataValues::I16((0..9i16).flat_map(|v| [v, -v]).collect())
    );
    reader.open_dataset(TIMESTAMPS_PATH).unwrap();
    assert_eq!(reader.extent(TIMESTAMPS_PATH).unwrap(), vec![9]);
}

#[test]
fn test_unflushed_rows_are_invisible_until_flush() {
    let store = MemoryStore::new();
    let io = recording_session(Arc::clone(&store));
    let mut reader = io.swmr_reader();
    reader.open_dataset(DATA_PATH).unwrap();

    let mut series = attached_series(&io);
    series
        .write_channel(0, &vec![1i16, 2, 3].into(), Some(&[0.0, 0.1, 0.2]))
        .unwrap();

    assert_eq!(reader.refresh_extent(DATA_PATH).unwrap(), vec![0, 2]);
    io.flush().unwrap();

    // The cached extent only moves on refresh
    assert_eq!(reader.extent(DATA_PATH).unwrap(), vec![0, 2]);
    assert_eq!(reader.refresh_extent(DATA_PATH).unwrap(), vec![3, 2]);

    // Channel 1 fills its column without moving the extent
    series
        .write_channel(1, &vec![-1i16, -2].into(), None)
        .unwrap();
    io.flush().unwrap();
    reader.refresh(DATA_PATH).unwrap();
    assert_eq!(reader.extent(DATA_PATH).unwrap(), vec![3, 2]);
    assert_eq!(
        reader.read(DATA_PATH).unwrap(),
        DataValues::I16(vec![1, -1, 2, -2, 3, 0])
    );
    assert_eq!(series.samples_recorded(), &[3, 2]);
}

#[test]
fn test_recording_freezes_structure() {
    let store = MemoryStore::new();
    let io = recording_session(store);
    assert!(!io.can_modify_objects());

    let err = io.create_group("/processing").unwrap_err();
    assert!(matches!(err, NwbError::InvalidState { .. }));
    let err = io
        .create_array_dataset(
            &DatasetConfig::vector(DataType::F64, 0, 16),
            "/acquisition/tetrode0/extra",
        )
        .unwrap_err();
    assert!(matches!(err, NwbError::InvalidState { .. }));

    let mut file = NwbFile::new("swmr-session", &io);
    let err = file
        .create_electrical_series(&[vec![Channel::new("CH9", "tetrode1", 0, 9)]], DataType::I16)
        .unwrap_err();
    assert!(matches!(err, NwbError::InvalidState { .. }));

    let mut series = attached_series(&io);
    assert_eq!(series.append_frames(&vec![7i16, -7].into(), None).unwrap(), 1);
}

#[test]
fn test_reader_rejects_unpublished_dataset() {
    let store = MemoryStore::new();
    let mut reader = MemorySwmrReader::new(store);
    assert!(reader.open_dataset("/acquisition/missing").is_err());
    assert!(reader.extent("/acquisition/missing").is_err());
}
