//! The root of an NWB file and the acquisition workflow built on it.

use super::electrical_series::ElectricalSeries;
use super::{Device, ElectrodeGroup, ElectrodeTable, CORE, ELECTRODE_GROUP_ROOT};
use crate::channel::Channel;
use crate::error::{NwbError, NwbResult};
use crate::hdmf::Container;
use crate::io::{
    merge_paths, AttributeValue, BaseIo, DataType, DataValues, DatasetConfig, FileMode,
    TYPE_NAME_ATTR,
};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};
use tracing::{debug, info};

/// Schema version written to the root `nwb_version` attribute.
pub const NWB_VERSION: &str = "2.7.0";
/// Rows per chunk of acquired data unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;
pub const ACQUISITION_PATH: &str = "/acquisition";
pub const DEVICES_PATH: &str = "/general/devices";
pub const SPECIFICATIONS_PATH: &str = "/specifications";

const SESSION_DESCRIPTION: &str = "a recording session";
const SERIES_DESCRIPTION: &str =
    "Stores continuously sampled voltage data from an extracellular ephys recording";

/// Groups every NWB file carries, parents before children.
const SKELETON: [&str; 10] = [
    ACQUISITION_PATH,
    "/analysis",
    "/processing",
    "/stimulus",
    "/stimulus/presentation",
    "/stimulus/templates",
    "/general",
    DEVICES_PATH,
    ELECTRODE_GROUP_ROOT,
    SPECIFICATIONS_PATH,
];

/// The `core::NWBFile` group at `/`.
///
/// Owns the electrical series it creates so acquisition code can look them up by
/// index while recording.
#[derive(Debug)]
pub struct NwbFile<'io> {
    root: Container<'io>,
    identifier: String,
    chunk_size: usize,
    series: Vec<ElectricalSeries<'io>>,
}

impl<'io> NwbFile<'io> {
    pub fn new(identifier: impl Into<String>, io: &'io dyn BaseIo) -> Self {
        Self {
            root: Container::with_type("/", io, CORE, "NWBFile"),
            identifier: identifier.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            series: Vec::new(),
        }
    }

    /// Rows per chunk for series created afterwards.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Opens the session if needed and writes the file skeleton unless the root is
    /// already typed.
    ///
    /// A closed session is opened with [`FileMode::Overwrite`]; open an existing file
    /// beforehand to append to it instead.
    pub fn initialize(&mut self) -> NwbResult<()> {
        let io = self.root.session();
        if !io.is_open() {
            io.open(FileMode::Overwrite)?;
        }
        if io.attribute_exists("/", TYPE_NAME_ATTR) {
            debug!(file = %io.file_name(), "File structure already present");
            return Ok(());
        }
        self.create_file_structure()
    }

    /// Writes the root attributes, the standard groups and the session datasets.
    pub fn create_file_structure(&mut self) -> NwbResult<()> {
        let io = self.root.session();
        if !io.can_modify_objects() {
            return Err(NwbError::invalid_state(
                "/",
                "the session cannot create objects (read-only or recording)",
            ));
        }
        io.create_common_nwb_attributes("/", CORE, "NWBFile", None)?;
        self.root.set_attribute("nwb_version", NWB_VERSION.into())?;
        for group in SKELETON {
            io.create_group(group)?;
        }
        self.root.set_attribute(
            ".specloc",
            AttributeValue::Reference(SPECIFICATIONS_PATH.to_string()),
        )?;

        let now = chrono::Local::now().to_rfc3339();
        for (name, value) in [
            ("file_create_date", now.as_str()),
            ("session_description", SESSION_DESCRIPTION),
            ("session_start_time", now.as_str()),
            ("timestamps_reference_time", now.as_str()),
            ("identifier", self.identifier.as_str()),
        ] {
            let handle =
                io.create_array_dataset(&DatasetConfig::vector(DataType::VarStr, 1, 1), &merge_paths("/", name))?;
            io.write_block(&handle, 0, &DataValues::Str(vec![value.to_string()]))?;
        }
        info!(file = %io.file_name(), identifier = %self.identifier, "Created NWB file structure");
        Ok(())
    }

    /// Creates one electrical series per channel array.
    ///
    /// Each array names its group from its first channel and gets a device, an
    /// electrode group and a series at `/acquisition/<group>`. All channels land in
    /// the electrode table, which is written before any series references it.
    pub fn create_electrical_series(
        &mut self,
        arrays: &[Vec<Channel>],
        dtype: DataType,
    ) -> NwbResult<()> {
        let io = self.root.session();
        if !io.can_modify_objects() {
            return Err(NwbError::invalid_state(
                ACQUISITION_PATH,
                "the session cannot create objects (read-only or recording)",
            ));
        }
        let groups = arrays
            .iter()
            .map(|channels| {
                channels.first().map(|ch| ch.group_name.clone()).ok_or_else(|| {
                    NwbError::Configuration("recording arrays must not be empty".to_string())
                })
            })
            .collect::<NwbResult<Vec<_>>>()?;

        for group in &groups {
            let device = Device::new(&merge_paths(DEVICES_PATH, group), io);
            device.initialize("description", "unknown")?;
            ElectrodeGroup::new(&merge_paths(ELECTRODE_GROUP_ROOT, group), io)
                .initialize("description", "unknown", &device)?;
        }

        let mut table = ElectrodeTable::new(io, arrays.concat());
        table.initialize()?;
        table.add_electrodes()?;

        for (group, channels) in groups.iter().zip(arrays) {
            let mut series = ElectricalSeries::new(&merge_paths(ACQUISITION_PATH, group), io);
            series.initialize(dtype, channels.clone(), SERIES_DESCRIPTION, self.chunk_size)?;
            self.series.push(series);
        }
        info!(series = groups.len(), dtype = %dtype, "Created electrical series");
        Ok(())
    }

    /// Switches the session to SWMR writing; no objects can be created afterwards.
    pub fn start_recording(&self) -> NwbResult<()> {
        self.root.session().start_recording()
    }

    pub fn stop_recording(&self) -> NwbResult<()> {
        self.root.session().stop_recording()
    }

    /// Drops the series and closes the session.
    pub fn finalize(&mut self) -> NwbResult<()> {
        self.series.clear();
        self.root.session().close()
    }

    /// Series created by [`NwbFile::create_electrical_series`], in array order.
    pub fn electrical_series(&self, index: usize) -> Option<&ElectricalSeries<'io>> {
        self.series.get(index)
    }

    pub fn electrical_series_mut(&mut self, index: usize) -> Option<&mut ElectricalSeries<'io>> {
        self.series.get_mut(index)
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The stored `/identifier` value.
    pub fn read_identifier(&self) -> NwbResult<String> {
        let values = self.io().read_dataset("/identifier")?;
        values
            .as_strings()
            .and_then(|s| s.first().cloned())
            .ok_or_else(|| NwbError::TypeMismatch {
                path: "/identifier".to_string(),
                expected: "string".to_string(),
                actual: values.dtype().to_string(),
            })
    }
}

impl RegisteredType for NwbFile<'_> {
    fn path(&self) -> &str {
        self.root.path()
    }

    fn io(&self) -> &dyn BaseIo {
        self.root.io()
    }

    fn namespace(&self) -> &str {
        self.root.namespace()
    }

    fn type_name(&self) -> &str {
        self.root.type_name()
    }
}

impl TypedEntity for NwbFile<'_> {
    const NAMESPACE: &'static str = CORE;
    const TYPE_NAME: &'static str = "NWBFile";

    /// A registry-built file has no identifier; it is meant for reading.
    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        let mut file = NwbFile::new(String::new(), io);
        file.root = Container::with_type(path, io, CORE, "NWBFile");
        Entity::NwbFile(file)
    }
}
