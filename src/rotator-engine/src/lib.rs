//! Background rotation engine for bounded log directories.
//!
//! Periodically scans configured directory trees and either compresses then
//! deletes matching files (rotate) or deletes them outright (delete),
//! optionally pruning subdirectories that end up empty.
//!
//! # Features
//!
//! - **Age-gated traversal**: depth-first walk that skips subtrees younger than
//!   the pattern offset and reports emptied directories post-order
//! - **Bounded batches**: at most `batch_cap` compress/delete operations in
//!   flight per pattern, and at most `10 * batch_cap` launched per call
//! - **Per-pattern loops**: one polling task per pattern that keeps draining
//!   while there is work and sleeps the poll interval when idle
//!
//! # Example
//!
//! ```rust,no_run
//! use rotator_engine::{Pattern, PatternAction, Rotator};
//! use std::time::Duration;
//!
//! # async fn run() -> rotator_engine::Result<()> {
//! let pattern = Pattern::new(PatternAction::Rotate, "/var/log/app", "*.log")?
//!     .with_age_offset(Duration::from_secs(24 * 60 * 60))
//!     .with_sub_dirs(true);
//!
//! let rotator = Rotator::new(Duration::from_secs(60), vec![pattern])?;
//! rotator.start()?;
//! // ...
//! rotator.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod compress;
pub mod executor;
pub mod operation;
pub mod pattern;
pub mod rotator;
pub mod traversal;

pub use compress::{Compressor, GzipCompressor, COMPRESSED_EXTENSION};
pub use executor::MAX_BATCH_MULTIPLIER;
pub use pattern::{Pattern, PatternAction};
pub use rotator::{Rotator, DEFAULT_BATCH_CAP};
pub use traversal::{EntryKind, FileSystemEntry, Traversal};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RotatorError {
    #[error("Poll interval is invalid: {0}ms (must be at least 1ms)")]
    InvalidPollInterval(u64),
    #[error("At least one match pattern should be provided")]
    NoPatterns,
    #[error("Invalid file pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("Log rotator is already running")]
    AlreadyRunning,
    #[error("Log rotator is not running")]
    NotRunning,
    #[error(
        "Cannot delete uncompressed file '{}' (without extension .gz) unless delete_uncompressed is set",
        .0.display()
    )]
    UncompressedFileProtected(PathBuf),
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to compress '{}': {source}", path.display())]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Directory traversal failed: {0}")]
    Traversal(String),
}

pub type Result<T> = std::result::Result<T, RotatorError>;
