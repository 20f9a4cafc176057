//! Tracing Infrastructure
//!
//! Structured logging for recording sessions, built on `tracing` and
//! `tracing-subscriber`:
//! - Structured events from the registry, entity layer, and backends
//! - Multiple output formats (pretty, compact, JSON)
//! - Environment-based filtering (`RUST_LOG` overrides the configured level)
//! - Integration with [`RecorderConfig`]
//!
//! # Example
//! ```no_run
//! use rust_nwb::{config::RecorderConfig, tracing_setup};
//! use tracing::info;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RecorderConfig::load()?;
//! tracing_setup::init_from_config(&config)?;
//!
//! info!(channels = config.channels.len(), "Recorder configured");
//! # Ok(())
//! # }
//! ```

use crate::config::RecorderConfig;
use crate::error::{NwbError, NwbResult};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log line format, selected by `application.log_format`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Multi-line, colored (interactive sessions)
    #[default]
    Pretty,
    /// Single-line, uncolored (unattended recorders)
    Compact,
    /// One JSON object per event (log aggregation)
    Json,
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Whether events carry the emitting file, line, and thread
    pub with_source_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Pretty,
            with_source_location: true,
        }
    }
}

impl TracingConfig {
    /// Level and format from the `[application]` section
    pub fn from_recorder_config(config: &RecorderConfig) -> NwbResult<Self> {
        Ok(Self {
            level: parse_log_level(&config.application.log_level)?,
            format: config.application.log_format,
            ..Default::default()
        })
    }

    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_source_location(mut self, enabled: bool) -> Self {
        self.with_source_location = enabled;
        self
    }
}

/// Initialize tracing from the recorder configuration
pub fn init_from_config(config: &RecorderConfig) -> NwbResult<()> {
    init(TracingConfig::from_recorder_config(config)?)
}

/// Install the global subscriber.
///
/// Idempotent: if a global subscriber is already installed this returns `Ok(())`.
///
/// # Example
/// ```no_run
/// use rust_nwb::tracing_setup::{self, OutputFormat, TracingConfig};
/// use tracing::Level;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TracingConfig::new(Level::DEBUG).with_format(OutputFormat::Json);
/// tracing_setup::init(config)?;
/// # Ok(())
/// # }
/// ```
pub fn init(config: TracingConfig) -> NwbResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_string(config.level)));
    let located = config.with_source_location;

    let layer = match config.format {
        OutputFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(located)
            .with_line_number(located)
            .with_thread_names(located)
            .boxed(),
        OutputFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(false)
            .with_file(located)
            .with_line_number(located)
            .with_thread_names(located)
            .boxed(),
        OutputFormat::Json => fmt::layer()
            .json()
            .with_file(located)
            .with_line_number(located)
            .with_thread_names(located)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter))
        .try_init()
        .or_else(|e| {
            // Already initialized: expected in tests and when embedded in a host application
            if e.to_string()
                .contains("a global default trace dispatcher has already been set")
            {
                Ok(())
            } else {
                Err(NwbError::Configuration(format!(
                    "Failed to initialize tracing: {}",
                    e
                )))
            }
        })
}

/// Parse log level string into tracing Level
fn parse_log_level(level: &str) -> NwbResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(NwbError::Configuration(format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        ))),
    }
}

fn level_to_filter_string(level: Level) -> String {
    match level {
        Level::TRACE => "trace".to_string(),
        Level::DEBUG => "debug".to_string(),
        Level::INFO => "info".to_string(),
        Level::WARN => "warn".to_string(),
        Level::ERROR => "error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("Debug"), Ok(Level::DEBUG)));
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_tracing_config_builder() {
        let config = TracingConfig::new(Level::WARN)
            .with_format(OutputFormat::Json)
            .with_source_location(false);

        assert!(matches!(config.level, Level::WARN));
        assert_eq!(config.format, OutputFormat::Json);
        assert!(!config.with_source_location);
    }

    #[test]
    fn test_format_follows_recorder_config() {
        let config: RecorderConfig = toml::from_str(
            "[application]\nname = \"rig\"\nlog_level = \"warn\"\nlog_format = \"compact\"\n\n[storage]\nbackend = \"memory\"\noutput_path = \"x.nwb\"\n",
        )
        .unwrap();
        let tracing = TracingConfig::from_recorder_config(&config).unwrap();
        assert!(matches!(tracing.level, Level::WARN));
        assert_eq!(tracing.format, OutputFormat::Compact);
    }

    #[test]
    #[serial]
    fn test_init_is_idempotent() {
        let config = TracingConfig::new(Level::DEBUG).with_format(OutputFormat::Compact);
        assert!(init(config.clone()).is_ok());
        assert!(init(config).is_ok());
    }
}
