//! Configuration loading for Log Rotator.
//!
//! Reads a TOML file describing the poll interval and an ordered list of
//! patterns, validates every field, and converts the result into the
//! immutable [`rotator_engine::Pattern`] values the engine runs.
//!
//! ```toml
//! poll_interval_ms = 60000
//!
//! [[pattern]]
//! action = "rotate"
//! dir = "logs"
//! file_pattern = "*.log"
//! offset = "1.00:00:00"
//! sub_dirs = true
//! ```

mod loader;
mod offset;

pub use loader::{
    PatternConfig, RotatorConfig, DEFAULT_COMPRESSION_LEVEL, DEFAULT_CONFIG_FILE,
};
pub use offset::parse_offset;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Configuration file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid offset value '{value}': {reason} (expected [d.]hh:mm[:ss[.fffffff]])")]
    InvalidOffset { value: String, reason: String },
    #[error("Invalid action value '{action}' at pattern {index}, valid values are: {valid}")]
    UnsupportedAction {
        action: String,
        index: usize,
        valid: String,
    },
    #[error("Compression level is invalid: {0} (must be 1-9)")]
    InvalidCompressionLevel(u32),
    #[error("Poll interval is invalid: {0}ms (must be at least 1ms)")]
    InvalidPollInterval(u64),
    #[error("At least one [[pattern]] should be provided")]
    NoPatterns,
    #[error("Pattern {index} has an empty dir")]
    EmptyDirPath { index: usize },
    #[error("Invalid pattern {index}: {source}")]
    Pattern {
        index: usize,
        #[source]
        source: rotator_engine::RotatorError,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
