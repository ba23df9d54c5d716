//! TOML configuration file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use rotator_engine::{Pattern, PatternAction};

use crate::offset::parse_offset;
use crate::{ConfigError, Result};

/// File looked up when no path is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "log-rotator.toml";

/// Gzip level used when the file does not set one.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

fn default_compression_level() -> u32 {
    DEFAULT_COMPRESSION_LEVEL
}

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotatorConfig {
    /// Milliseconds an idle pattern waits before polling again.
    pub poll_interval_ms: u64,

    /// Gzip level for the rotate action (1-9).
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Patterns in the order they appear in the file.
    #[serde(default, rename = "pattern")]
    pub patterns: Vec<PatternConfig>,

    /// Directory relative `dir` values resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// One `[[pattern]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternConfig {
    /// `rotate` or `delete`, case-insensitive.
    pub action: String,
    pub dir: PathBuf,
    pub file_pattern: String,
    /// `[d.]hh:mm[:ss[.fffffff]]`
    pub offset: String,
    #[serde(default)]
    pub sub_dirs: bool,
    #[serde(default)]
    pub delete_uncompressed: bool,
    #[serde(default)]
    pub min_size: u64,
    #[serde(default)]
    pub prune_empty_dirs: bool,
}

impl RotatorConfig {
    /// Read and parse a configuration file. Relative pattern directories
    /// resolve against the directory containing the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let read_error = |source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        };

        let path = dunce::canonicalize(path).map_err(read_error)?;
        let content = std::fs::read_to_string(&path).map_err(read_error)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        debug!(path = %path.display(), "Loading configuration");
        Self::from_toml_str(&content, base_dir)
    }

    /// Parse configuration from memory.
    pub fn from_toml_str(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        if self.poll_interval_ms < 1 {
            return Err(ConfigError::InvalidPollInterval(self.poll_interval_ms));
        }
        Ok(Duration::from_millis(self.poll_interval_ms))
    }

    pub fn compression_level(&self) -> Result<u32> {
        if !(1..=9).contains(&self.compression_level) {
            return Err(ConfigError::InvalidCompressionLevel(self.compression_level));
        }
        Ok(self.compression_level)
    }

    /// Validate every pattern and convert them, preserving file order.
    pub fn patterns(&self) -> Result<Vec<Pattern>> {
        if self.patterns.is_empty() {
            return Err(ConfigError::NoPatterns);
        }
        self.patterns
            .iter()
            .enumerate()
            .map(|(index, pattern)| pattern.build(index, &self.base_dir))
            .collect()
    }

    /// Validate everything and return `(poll interval, patterns)`.
    pub fn build(&self) -> Result<(Duration, Vec<Pattern>)> {
        self.compression_level()?;
        Ok((self.poll_interval()?, self.patterns()?))
    }
}

impl PatternConfig {
    fn build(&self, index: usize, base_dir: &Path) -> Result<Pattern> {
        let action = PatternAction::from_keyword(&self.action).ok_or_else(|| {
            ConfigError::UnsupportedAction {
                action: self.action.clone(),
                index,
                valid: PatternAction::ALL
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        })?;

        if self.dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDirPath { index });
        }
        let dir = if self.dir.is_absolute() {
            self.dir.clone()
        } else {
            base_dir.join(&self.dir)
        };

        let offset = parse_offset(&self.offset)?;

        let pattern = Pattern::new(action, dir, &self.file_pattern)
            .map_err(|source| ConfigError::Pattern { index, source })?
            .with_age_offset(offset)
            .with_sub_dirs(self.sub_dirs)
            .with_delete_uncompressed(self.delete_uncompressed)
            .with_min_size(self.min_size)
            .with_prune_empty_dirs(self.prune_empty_dirs);

        Ok(pattern)
    }
}
