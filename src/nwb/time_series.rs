//! Sampled data with per-row timestamps.

use super::CORE;
use crate::error::{NwbError, NwbResult};
use crate::hdmf::{Container, Data};
use crate::io::{AttributeValue, BaseIo, DataType, DataValues, DatasetConfig};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};
use tracing::debug;

/// Free-text comments on a series.
pub const COMMENTS_ATTR: &str = "comments";
/// Unit attribute on `data` and `timestamps`.
pub const UNIT_ATTR: &str = "unit";

/// Descriptive attributes written by [`TimeSeries::initialize`].
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesAttributes {
    pub unit: String,
    pub description: String,
    pub comments: String,
    /// Multiplier taking stored values to `unit`.
    pub conversion: f32,
    /// Smallest meaningful difference between values, `-1.0` when unknown.
    pub resolution: f32,
    /// Added after scaling by `conversion`.
    pub offset: f32,
}

impl Default for SeriesAttributes {
    fn default() -> Self {
        Self {
            unit: "unknown".to_string(),
            description: "no description".to_string(),
            comments: "no comments".to_string(),
            conversion: 1.0,
            resolution: -1.0,
            offset: 0.0,
        }
    }
}

/// A group holding a `data` dataset and a matching `f64` `timestamps` dataset.
///
/// Axis 0 of `data` is time. `timestamps` has one entry per row of `data` and is
/// written alongside it.
#[derive(Debug)]
pub struct TimeSeries<'io> {
    container: Container<'io>,
    data: Data<'io>,
    timestamps: Data<'io>,
}

impl<'io> TimeSeries<'io> {
    pub fn new(path: &str, io: &'io dyn BaseIo) -> Self {
        Self::with_type(path, io, CORE, "TimeSeries")
    }

    /// A series subtype with its own schema identity.
    pub fn with_type(
        path: &str,
        io: &'io dyn BaseIo,
        namespace: &'static str,
        type_name: &'static str,
    ) -> Self {
        let container = Container::with_type(path, io, namespace, type_name);
        let data = Data::new(&container.child_path("data"), io);
        let timestamps = Data::new(&container.child_path("timestamps"), io);
        Self {
            container,
            data,
            timestamps,
        }
    }

    /// Creates the group, `data` shaped by `dataset`, and `timestamps`.
    pub fn initialize(
        &mut self,
        dataset: &DatasetConfig,
        attributes: &SeriesAttributes,
    ) -> NwbResult<()> {
        dataset.validate(self.data.path())?;
        let io = self.container.session();

        self.container
            .initialize_typed(Some(attributes.description.as_str()))?;
        self.container
            .set_attribute(COMMENTS_ATTR, attributes.comments.as_str().into())?;

        io.create_array_dataset(dataset, self.data.path())?;
        self.data.attach()?;
        for (name, value) in [
            ("conversion", AttributeValue::F64(f64::from(attributes.conversion))),
            ("resolution", AttributeValue::F64(f64::from(attributes.resolution))),
            ("offset", AttributeValue::F64(f64::from(attributes.offset))),
            (UNIT_ATTR, attributes.unit.as_str().into()),
        ] {
            self.data.set_attribute(name, value)?;
        }

        let rows = dataset.shape().first().copied().unwrap_or(0);
        let chunk = dataset.chunking().first().copied().unwrap_or(1);
        io.create_array_dataset(
            &DatasetConfig::vector(DataType::F64, rows, chunk),
            self.timestamps.path(),
        )?;
        self.timestamps.attach()?;
        self.timestamps
            .set_attribute("interval", AttributeValue::I32(1))?;
        self.timestamps.set_attribute(UNIT_ATTR, "seconds".into())?;
        debug!(path = %self.path(), shape = ?dataset.shape(), "Initialized time series");
        Ok(())
    }

    /// Binds `data` and `timestamps` of a stored series.
    pub fn load(&mut self) -> NwbResult<()> {
        self.data.attach()?;
        self.timestamps.attach()
    }

    fn check_timestamps(&self, rows: usize, timestamps: Option<&[f64]>) -> NwbResult<()> {
        match timestamps {
            Some(ts) if ts.len() != rows => Err(NwbError::RowCountMismatch {
                path: self.timestamps.path().to_string(),
                expected: rows,
                actual: ts.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Writes a `shape` block of `data` at `offset`, plus timestamps for its rows.
    pub fn write_data(
        &mut self,
        offset: &[usize],
        shape: &[usize],
        values: &DataValues,
        timestamps: Option<&[f64]>,
    ) -> NwbResult<()> {
        let (start, rows) = match (offset.first(), shape.first()) {
            (Some(&start), Some(&rows)) => (start, rows),
            _ => {
                return Err(NwbError::Configuration(format!(
                    "block for '{}' needs at least one dimension",
                    self.path()
                )))
            }
        };
        self.check_timestamps(rows, timestamps)?;
        self.data.write_region(offset, shape, values)?;
        if let Some(ts) = timestamps {
            self.timestamps
                .write_region(&[start], &[rows], &ts.to_vec().into())?;
        }
        Ok(())
    }

    /// Appends whole rows of `data` (and their timestamps) at the end.
    ///
    /// Returns the new row count.
    pub fn append(&mut self, values: &DataValues, timestamps: Option<&[f64]>) -> NwbResult<usize> {
        let width = self.data.handle().map_or(1, |h| h.row_width());
        self.check_timestamps(values.len() / width, timestamps)?;
        let rows = self.data.append(values)?;
        if let Some(ts) = timestamps {
            self.timestamps.append(&ts.to_vec().into())?;
        }
        Ok(rows)
    }

    pub fn data(&self) -> &Data<'io> {
        &self.data
    }

    pub fn timestamps(&self) -> &Data<'io> {
        &self.timestamps
    }

    pub fn read_comments(&self) -> NwbResult<String> {
        let value = self.io().read_attribute(self.path(), COMMENTS_ATTR)?;
        value.as_str().map(str::to_owned).ok_or_else(|| NwbError::TypeMismatch {
            path: self.path().to_string(),
            expected: "string comments".to_string(),
            actual: format!("{:?}", value),
        })
    }

    pub fn container(&self) -> &Container<'io> {
        &self.container
    }
}

impl RegisteredType for TimeSeries<'_> {
    fn path(&self) -> &str {
        self.container.path()
    }

    fn io(&self) -> &dyn BaseIo {
        self.container.io()
    }

    fn namespace(&self) -> &str {
        self.container.namespace()
    }

    fn type_name(&self) -> &str {
        self.container.type_name()
    }
}

impl TypedEntity for TimeSeries<'_> {
    const NAMESPACE: &'static str = CORE;
    const TYPE_NAME: &'static str = "TimeSeries";

    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        Entity::TimeSeries(TimeSeries::new(path, io))
    }
}
