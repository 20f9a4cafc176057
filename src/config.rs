//! Recorder configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables prefixed with `RUST_NWB_`, with `__` separating
//!    nesting levels (e.g. `RUST_NWB_STORAGE__CHUNK_SIZE=4096`)
//!
//! # Example
//! ```no_run
//! use rust_nwb::config::RecorderConfig;
//!
//! let config = RecorderConfig::load_from("config/recorder.toml")?;
//! config.validate()?;
//! println!("Recording {} channels", config.channels.len());
//! # Ok::<(), rust_nwb::error::NwbError>(())
//! ```

use crate::channel::Channel;
use crate::error::{NwbError, NwbResult};
use crate::io::{create_io, BackendKind, BaseIo};
use crate::tracing_setup::OutputFormat;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Top-level recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Storage backend settings
    pub storage: StorageConfig,
    /// Recorded channels, in acquisition order
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log line format (pretty, compact, json)
    #[serde(default)]
    pub log_format: OutputFormat,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Container backend (memory or hdf5)
    pub backend: BackendKind,
    /// Output file
    pub output_path: PathBuf,
    /// Record in single-writer / multiple-reader mode
    #[serde(default = "default_swmr")]
    pub swmr: bool,
    /// Chunk length of appendable datasets
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_swmr() -> bool {
    true
}

fn default_chunk_size() -> usize {
    crate::hdmf::table::dynamic_table::DEFAULT_CHUNK_SIZE
}

impl RecorderConfig {
    /// Load configuration from `config/recorder.toml` and environment variables
    pub fn load() -> NwbResult<Self> {
        Self::load_from("config/recorder.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> NwbResult<Self> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RUST_NWB_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> NwbResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(NwbError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.storage.chunk_size == 0 {
            return Err(NwbError::Configuration(
                "Invalid chunk_size 0. Must be at least 1".to_string(),
            ));
        }

        // Electrode numbers must be unique
        let mut indices = HashSet::new();
        for channel in &self.channels {
            if !indices.insert(channel.global_index) {
                return Err(NwbError::Configuration(format!(
                    "Duplicate channel global_index: {} ({})",
                    channel.global_index, channel.name
                )));
            }
        }

        Ok(())
    }

    /// Channels belonging to `group_name`
    pub fn channels_in_group(&self, group_name: &str) -> Vec<&Channel> {
        self.channels
            .iter()
            .filter(|ch| ch.group_name == group_name)
            .collect()
    }

    /// Channels split into one array per group, groups in order of first appearance
    pub fn recording_arrays(&self) -> Vec<Vec<Channel>> {
        let mut arrays: Vec<Vec<Channel>> = Vec::new();
        for channel in &self.channels {
            match arrays
                .iter_mut()
                .find(|array| array[0].group_name == channel.group_name)
            {
                Some(array) => array.push(channel.clone()),
                None => arrays.push(vec![channel.clone()]),
            }
        }
        arrays
    }

    /// An unopened I/O session for the configured backend and output file
    pub fn create_io(&self) -> NwbResult<Box<dyn BaseIo>> {
        create_io(self.storage.backend, &self.storage.output_path)
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> NwbResult<String> {
        toml::to_string_pretty(self).map_err(|e| NwbError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RecorderConfig {
        RecorderConfig {
            application: ApplicationConfig {
                name: "Test".to_string(),
                log_level: "info".to_string(),
                log_format: OutputFormat::Pretty,
            },
            storage: StorageConfig {
                backend: BackendKind::Memory,
                output_path: PathBuf::from("data/session.nwb"),
                swmr: true,
                chunk_size: 1024,
            },
            channels: vec![
                Channel::new("ch0", "array0", 0, 0),
                Channel::new("ch1", "array0", 1, 1),
            ],
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_recording_arrays_group_in_first_seen_order() {
        let mut config = test_config();
        config.channels.insert(1, Channel::new("ch2", "array1", 0, 2));
        config.channels.push(Channel::new("ch3", "array1", 1, 3));

        let arrays = config.recording_arrays();
        let names: Vec<Vec<&str>> = arrays
            .iter()
            .map(|a| a.iter().map(|ch| ch.name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["ch0", "ch1"], vec!["ch2", "ch3"]]);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = test_config();
        config.application.log_level = "verbose".to_string();
        assert!(matches!(config.validate(), Err(NwbError::Configuration(_))));
    }

    #[test]
    fn test_zero_chunk_size() {
        let mut config = test_config();
        config.storage.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_global_index() {
        let mut config = test_config();
        config.channels.push(Channel::new("ch2", "array1", 0, 1));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate channel global_index: 1"));
    }

    #[test]
    fn test_channels_in_group() {
        let config = test_config();
        assert_eq!(config.channels_in_group("array0").len(), 2);
        assert!(config.channels_in_group("array1").is_empty());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = test_config();
        let text = config.to_toml().unwrap();
        let parsed: RecorderConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.channels, config.channels);
        assert_eq!(parsed.storage.backend, BackendKind::Memory);
    }
}
