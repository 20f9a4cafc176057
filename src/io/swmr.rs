//! Reader side of the single-writer / multiple-reader protocol.
//!
//! The writer appends (extend, write, flush) while any number of readers poll:
//!
//! ```text
//! writer: create structure -> start_recording -> { extend; write; flush }* -> stop_recording
//! reader: open_dataset -> { refresh; extent; read }*
//! ```
//!
//! A reader sees a dataset only as of its last `refresh`. After a refresh the extent
//! includes every flush that completed before it. Readers never block and never see
//! data that has not been flushed.

use super::DataValues;
use crate::error::{NwbError, NwbResult};
use tracing::warn;

/// Polling reader of a file being written in SWMR mode.
pub trait SwmrReader {
    /// Load the dataset at `path` for the first time.
    fn open_dataset(&mut self, path: &str) -> NwbResult<()>;

    /// Re-read the dataset's metadata so later reads observe completed flushes.
    fn refresh(&mut self, path: &str) -> NwbResult<()>;

    /// Shape as of the last refresh.
    fn extent(&self, path: &str) -> NwbResult<Vec<usize>>;

    /// Values as of the last refresh.
    fn read(&self, path: &str) -> NwbResult<DataValues>;

    /// `refresh` followed by `extent`.
    fn refresh_extent(&mut self, path: &str) -> NwbResult<Vec<usize>> {
        self.refresh(path)?;
        self.extent(path)
    }
}

/// Records the first-axis extents a reader samples and rejects any regression.
///
/// Datasets are append-only, so a decreasing sample means the writer or the reader
/// broke the protocol.
#[derive(Debug, Clone)]
pub struct ExtentMonitor {
    path: String,
    samples: Vec<usize>,
}

impl ExtentMonitor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            samples: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Every accepted sample, oldest first.
    pub fn samples(&self) -> &[usize] {
        &self.samples
    }

    pub fn latest(&self) -> Option<usize> {
        self.samples.last().copied()
    }

    /// Records the first-axis length of `extent`.
    pub fn record(&mut self, extent: &[usize]) -> NwbResult<usize> {
        let observed = extent.first().copied().unwrap_or(0);
        if let Some(previous) = self.latest() {
            if observed < previous {
                warn!(path = %self.path, previous, observed, "Extent went backwards");
                return Err(NwbError::ExtentRegression {
                    path: self.path.clone(),
                    previous,
                    observed,
                });
            }
        }
        self.samples.push(observed);
        Ok(observed)
    }

    /// Refreshes `reader` and records the resulting extent.
    pub fn sample<R: SwmrReader + ?Sized>(&mut self, reader: &mut R) -> NwbResult<usize> {
        let extent = reader.refresh_extent(&self.path)?;
        self.record(&extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn monitor_accepts_growth_and_plateaus() {
        let mut monitor = ExtentMonitor::new("/acquisition/ts/data");
        assert_eq!(monitor.record(&[0]).unwrap(), 0);
        assert_eq!(monitor.record(&[2, 32]).unwrap(), 2);
        assert_eq!(monitor.record(&[2, 32]).unwrap(), 2);
        assert_eq!(monitor.samples(), &[0, 2, 2]);
    }

    #[test]
    #[traced_test]
    fn monitor_rejects_regression() {
        let mut monitor = ExtentMonitor::new("/ts");
        monitor.record(&[5]).unwrap();
        let err = monitor.record(&[4]).unwrap_err();
        assert!(matches!(
            err,
            NwbError::ExtentRegression {
                previous: 5,
                observed: 4,
                ..
            }
        ));
        assert_eq!(monitor.latest(), Some(5));
        assert!(logs_contain("Extent went backwards"));
    }
}
