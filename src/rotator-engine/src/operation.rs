//! Per-entry rotate/delete operations.
//!
//! Every failure is caught here, logged, and turned into `false` so one bad
//! entry never aborts its siblings.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::compress::{Compressor, COMPRESSED_EXTENSION};
use crate::pattern::{Pattern, PatternAction};
use crate::traversal::{EntryKind, FileSystemEntry};
use crate::{Result, RotatorError};

/// Everything an operation needs from its pattern, detached so it can move
/// onto a blocking worker thread.
#[derive(Clone)]
pub struct EntryOperation {
    action: PatternAction,
    delete_uncompressed: bool,
    compressor: Arc<dyn Compressor>,
}

impl EntryOperation {
    pub fn for_pattern(pattern: &Pattern, compressor: Arc<dyn Compressor>) -> Self {
        Self {
            action: pattern.action(),
            delete_uncompressed: pattern.delete_uncompressed(),
            compressor,
        }
    }

    /// Apply the action to `entry`. Returns `true` only if every step succeeded.
    pub fn apply(&self, entry: &FileSystemEntry) -> bool {
        match self.try_apply(entry) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    action = %self.action,
                    path = %entry.path.display(),
                    error = %e,
                    "Entry operation failed"
                );
                false
            }
        }
    }

    pub fn try_apply(&self, entry: &FileSystemEntry) -> Result<()> {
        match (self.action, entry.kind) {
            (PatternAction::Rotate, EntryKind::File) => self.rotate(&entry.path),
            (PatternAction::Rotate, EntryKind::Directory) => Err(RotatorError::Io {
                path: entry.path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "cannot rotate a directory"),
            }),
            (PatternAction::Delete, EntryKind::File) => self.delete_file(&entry.path),
            (PatternAction::Delete, EntryKind::Directory) => {
                info!(path = %entry.path.display(), "Deleting empty directory");
                fs::remove_dir(&entry.path).map_err(|source| RotatorError::Io {
                    path: entry.path.clone(),
                    source,
                })
            }
        }
    }

    /// Compress then delete. A failed compression leaves the original alone;
    /// a failed delete leaves both the archive and the original behind and
    /// still counts as a failure.
    fn rotate(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Compressing file");
        self.compressor
            .compress(path)
            .map_err(|source| RotatorError::Compression {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), "Deleting original file");
        fs::remove_file(path).map_err(|source| RotatorError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Deleting file");
        if !is_compressed(path) && !self.delete_uncompressed {
            return Err(RotatorError::UncompressedFileProtected(path.to_path_buf()));
        }
        fs::remove_file(path).map_err(|source| RotatorError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn is_compressed(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == COMPRESSED_EXTENSION)
}
