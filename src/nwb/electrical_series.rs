//! Extracellular voltage recordings.

use super::time_series::{SeriesAttributes, TimeSeries};
use super::{ELECTRODE_TABLE_PATH, CORE};
use crate::channel::Channel;
use crate::error::{NwbError, NwbResult};
use crate::hdmf::table::{DynamicTableRegion, ID_COLUMN};
use crate::hdmf::Data;
use crate::io::{merge_paths, AttributeValue, BaseIo, DataType, DataValues, DatasetConfig};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};
use tracing::{debug, info};

const ELECTRODES_DESCRIPTION: &str = "the electrodes that generated this electrical series";

/// A [`TimeSeries`] of shape `[samples, channels]` in volts.
///
/// Besides `data` and `timestamps` the group holds `channel_conversion` (volts per
/// raw unit, one per channel) and `electrodes`, a region of the electrode table
/// naming the electrode behind each column. Channels may be written one column at a
/// time with [`ElectricalSeries::write_channel`]; each channel keeps its own sample
/// count and only channel 0 writes timestamps.
#[derive(Debug)]
pub struct ElectricalSeries<'io> {
    series: TimeSeries<'io>,
    channel_conversion: Data<'io>,
    electrodes: DynamicTableRegion<'io>,
    channels: Vec<Channel>,
    samples_recorded: Vec<usize>,
}

impl<'io> ElectricalSeries<'io> {
    pub fn new(path: &str, io: &'io dyn BaseIo) -> Self {
        let series = TimeSeries::with_type(path, io, CORE, "ElectricalSeries");
        let container = series.container();
        let channel_conversion = Data::new(&container.child_path("channel_conversion"), io);
        let electrodes = DynamicTableRegion::new(&container.child_path("electrodes"), io);
        Self {
            series,
            channel_conversion,
            electrodes,
            channels: Vec::new(),
            samples_recorded: Vec::new(),
        }
    }

    /// Creates the series for `channels` with samples of type `dtype`.
    ///
    /// The electrode table must already hold a row for every channel's global index;
    /// this is checked before anything is written.
    pub fn initialize(
        &mut self,
        dtype: DataType,
        channels: Vec<Channel>,
        description: &str,
        chunk_size: usize,
    ) -> NwbResult<()> {
        let first = channels.first().ok_or_else(|| {
            NwbError::Configuration(format!("electrical series '{}' has no channels", self.path()))
        })?;
        let io = self.series.container().session();
        let electrode_count = io
            .dataset_extent(&merge_paths(ELECTRODE_TABLE_PATH, ID_COLUMN))
            .map_err(|_| {
                NwbError::invalid_state(self.path(), "the electrode table must be written first")
            })?
            .first()
            .copied()
            .unwrap_or(0);
        let mut indices = Vec::with_capacity(channels.len());
        for channel in &channels {
            match i64::try_from(channel.global_index) {
                Ok(index) if channel.global_index < electrode_count => indices.push(index),
                _ => {
                    return Err(NwbError::RegionOutOfRange {
                        path: self.electrodes.path().to_string(),
                        index: i64::try_from(channel.global_index).unwrap_or(i64::MAX),
                        rows: electrode_count,
                    })
                }
            }
        }

        let width = channels.len();
        let chunk = chunk_size.max(1);
        let attributes = SeriesAttributes {
            unit: "volts".to_string(),
            description: description.to_string(),
            comments: first.comments.clone(),
            ..Default::default()
        };
        self.series.initialize(
            &DatasetConfig::new(dtype, vec![0, width], vec![chunk, width]),
            &attributes,
        )?;

        let conversions: Vec<f32> = channels.iter().map(Channel::effective_conversion).collect();
        io.create_array_dataset(
            &DatasetConfig::vector(DataType::F32, 0, width),
            self.channel_conversion.path(),
        )?;
        self.channel_conversion.attach()?;
        self.channel_conversion.write(&conversions.into())?;
        self.channel_conversion
            .set_attribute("axis", AttributeValue::I32(1))?;

        let handle = io.create_array_dataset(
            &DatasetConfig::vector(DataType::I32, 0, width),
            self.electrodes.path(),
        )?;
        self.electrodes
            .initialize(handle, ELECTRODES_DESCRIPTION, ELECTRODE_TABLE_PATH)?;
        self.electrodes.set_rows(&indices)?;

        self.samples_recorded = vec![0; width];
        self.channels = channels;
        info!(path = %self.path(), channels = width, dtype = %dtype, "Initialized electrical series");
        Ok(())
    }

    /// Binds a stored series for further writes. Every channel resumes at the
    /// current end of `data`.
    pub fn load(&mut self) -> NwbResult<()> {
        self.series.load()?;
        self.channel_conversion.attach()?;
        self.electrodes.attach()?;
        let extent = self.series.data().extent()?;
        let width = extent.get(1).copied().unwrap_or(1);
        self.samples_recorded = vec![self.series.data().rows(); width];
        debug!(path = %self.path(), channels = width, rows = self.series.data().rows(), "Loaded electrical series");
        Ok(())
    }

    /// Appends `samples` to one channel's column.
    ///
    /// `timestamps` are stored only when `channel` is 0 and must then match the
    /// number of samples.
    pub fn write_channel(
        &mut self,
        channel: usize,
        samples: &DataValues,
        timestamps: Option<&[f64]>,
    ) -> NwbResult<()> {
        let recorded = *self.samples_recorded.get(channel).ok_or_else(|| {
            NwbError::Configuration(format!(
                "electrical series '{}' has {} channels, not {}",
                self.path(),
                self.samples_recorded.len(),
                channel + 1
            ))
        })?;
        let timestamps = if channel == 0 { timestamps } else { None };
        let count = samples.len();
        self.series
            .write_data(&[recorded, channel], &[count, 1], samples, timestamps)?;
        self.samples_recorded[channel] = recorded + count;
        Ok(())
    }

    /// Appends interleaved frames (one sample per channel per row) to every channel.
    ///
    /// Requires all channels to be at the same sample count. Returns the new count.
    pub fn append_frames(
        &mut self,
        frames: &DataValues,
        timestamps: Option<&[f64]>,
    ) -> NwbResult<usize> {
        let rows = self.series.data().rows();
        if self.samples_recorded.iter().any(|&n| n != rows) {
            return Err(NwbError::invalid_state(
                self.path(),
                "channels were written individually and are not aligned",
            ));
        }
        let rows = self.series.append(frames, timestamps)?;
        self.samples_recorded.iter_mut().for_each(|n| *n = rows);
        Ok(rows)
    }

    /// Samples written so far, per channel.
    pub fn samples_recorded(&self) -> &[usize] {
        &self.samples_recorded
    }

    /// Channels given to `initialize`; empty for a loaded series.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn series(&self) -> &TimeSeries<'io> {
        &self.series
    }

    pub fn electrodes(&self) -> &DynamicTableRegion<'io> {
        &self.electrodes
    }

    pub fn read_channel_conversion(&self) -> NwbResult<DataValues> {
        self.channel_conversion.read_values()
    }
}

impl RegisteredType for ElectricalSeries<'_> {
    fn path(&self) -> &str {
        self.series.path()
    }

    fn io(&self) -> &dyn BaseIo {
        self.series.io()
    }

    fn namespace(&self) -> &str {
        self.series.namespace()
    }

    fn type_name(&self) -> &str {
        self.series.type_name()
    }
}

impl TypedEntity for ElectricalSeries<'_> {
    const NAMESPACE: &'static str = CORE;
    const TYPE_NAME: &'static str = "ElectricalSeries";

    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        Entity::ElectricalSeries(ElectricalSeries::new(path, io))
    }
}
