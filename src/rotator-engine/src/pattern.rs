//! Rotation rules.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::traversal::{EntryKind, FileSystemEntry};
use crate::{Result, RotatorError};

/// Action to perform on matched files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternAction {
    /// Compress the file, then delete the original.
    Rotate,
    /// Delete the file permanently.
    Delete,
}

impl PatternAction {
    /// Every supported action, in declaration order.
    pub const ALL: [PatternAction; 2] = [PatternAction::Rotate, PatternAction::Delete];

    /// Parse a configuration keyword, ignoring ASCII case.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(keyword.trim()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternAction::Rotate => "Rotate",
            PatternAction::Delete => "Delete",
        }
    }
}

impl fmt::Display for PatternAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rotation rule: a directory, a file name glob, age and size thresholds,
/// and the action applied to whatever matches.
///
/// Patterns are built once from validated configuration and never change
/// afterwards; every field is private and only readable through accessors.
#[derive(Debug, Clone)]
pub struct Pattern {
    action: PatternAction,
    root_dir: PathBuf,
    name_pattern: glob::Pattern,
    age_offset: Duration,
    sub_dirs: bool,
    min_size: u64,
    delete_uncompressed: bool,
    prune_empty_dirs: bool,
}

impl Pattern {
    /// Create a pattern with no age offset, no recursion, no size threshold
    /// and all deletion safeguards enabled.
    ///
    /// Fails if `name_pattern` is not a valid glob.
    pub fn new(
        action: PatternAction,
        root_dir: impl Into<PathBuf>,
        name_pattern: &str,
    ) -> Result<Self> {
        let name_pattern =
            glob::Pattern::new(name_pattern).map_err(|source| RotatorError::InvalidGlob {
                pattern: name_pattern.to_string(),
                source,
            })?;

        Ok(Self {
            action,
            root_dir: root_dir.into(),
            name_pattern,
            age_offset: Duration::ZERO,
            sub_dirs: false,
            min_size: 0,
            delete_uncompressed: false,
            prune_empty_dirs: false,
        })
    }

    pub fn with_age_offset(mut self, offset: Duration) -> Self {
        self.age_offset = offset;
        self
    }

    pub fn with_sub_dirs(mut self, sub_dirs: bool) -> Self {
        self.sub_dirs = sub_dirs;
        self
    }

    pub fn with_min_size(mut self, bytes: u64) -> Self {
        self.min_size = bytes;
        self
    }

    /// Allow the delete action to remove files without a `.gz` extension.
    pub fn with_delete_uncompressed(mut self, allow: bool) -> Self {
        self.delete_uncompressed = allow;
        self
    }

    /// Delete subdirectories once they have been emptied. Only honored by
    /// the delete action.
    pub fn with_prune_empty_dirs(mut self, prune: bool) -> Self {
        self.prune_empty_dirs = prune;
        self
    }

    pub fn action(&self) -> PatternAction {
        self.action
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn name_pattern(&self) -> &str {
        self.name_pattern.as_str()
    }

    pub fn age_offset(&self) -> Duration {
        self.age_offset
    }

    pub fn sub_dirs(&self) -> bool {
        self.sub_dirs
    }

    pub fn min_size(&self) -> u64 {
        self.min_size
    }

    pub fn delete_uncompressed(&self) -> bool {
        self.delete_uncompressed
    }

    pub fn prune_empty_dirs(&self) -> bool {
        self.prune_empty_dirs
    }

    /// `now - age_offset`, saturating at the Unix epoch.
    pub(crate) fn cutoff(&self) -> SystemTime {
        SystemTime::now()
            .checked_sub(self.age_offset)
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    pub(crate) fn matches_name(&self, file_name: &str) -> bool {
        self.name_pattern.matches(file_name)
    }

    /// Emptied subdirectories are removed: delete action with pruning on.
    pub(crate) fn prunes_dirs(&self) -> bool {
        self.action == PatternAction::Delete && self.prune_empty_dirs
    }

    /// Whether the executor should act on an entry produced by traversal.
    pub(crate) fn accepts(&self, entry: &FileSystemEntry) -> bool {
        match entry.kind {
            EntryKind::File => true,
            EntryKind::Directory => self.prunes_dirs(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[action: {}, dir: {}, file_pattern: {}, offset: {}, sub_dirs: {}, delete_uncompressed: {}, min_size: {}, prune_empty_dirs: {}]",
            self.action,
            self.root_dir.display(),
            self.name_pattern,
            format_offset(self.age_offset),
            self.sub_dirs,
            self.delete_uncompressed,
            self.min_size,
            self.prune_empty_dirs
        )
    }
}

/// Render a duration as `[d.]hh:mm:ss[.fffffff]`.
pub fn format_offset(offset: Duration) -> String {
    let total = offset.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    // 100ns ticks
    let ticks = offset.subsec_nanos() / 100;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}."));
    }
    out.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if ticks > 0 {
        out.push_str(&format!(".{ticks:07}"));
    }
    out
}
