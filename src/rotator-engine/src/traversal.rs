//! Age-gated directory traversal.
//!
//! A [`Traversal`] walks a pattern's directory tree depth-first and yields
//! eligible entries lazily. Per directory the order is:
//! 1. matching files older than the cutoff and at least `min_size` bytes
//! 2. the contents of each subdirectory, ordered by name length then name
//! 3. the directory itself, if it is not the root and has no children left
//!
//! A directory created after the cutoff is skipped together with its whole
//! subtree. The cutoff is recomputed for every directory visited.
//!
//! Step 3 looks at the directory as it is at that moment. A consumer that
//! deletes entries asynchronously must finish those deletions before the
//! check, or the directory is only reported on a later walk; the batch
//! executor does this through [`Traversal::before_leave`].

use std::cmp::Ordering;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::pattern::Pattern;

/// Kind of filesystem entry yielded by a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Snapshot of one file or directory taken while walking.
#[derive(Debug, Clone)]
pub struct FileSystemEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub modified: SystemTime,
    /// Birth time where the platform reports one, otherwise the modification time.
    pub created: SystemTime,
    pub size: u64,
}

impl FileSystemEntry {
    fn from_metadata(path: PathBuf, kind: EntryKind, metadata: &Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Self {
            path,
            kind,
            modified,
            created: metadata.created().unwrap_or(modified),
            size: metadata.len(),
        }
    }
}

enum Frame {
    Visit(PathBuf),
    Files(std::vec::IntoIter<FileSystemEntry>),
    Leave(PathBuf),
}

/// Lazy depth-first walk over a pattern's directory tree.
///
/// Re-walks from scratch every time it is created; it holds no cursor state
/// between traversals.
pub struct Traversal<'a> {
    pattern: &'a Pattern,
    stack: Vec<Frame>,
    before_leave: Option<Box<dyn FnMut() -> bool + 'a>>,
}

impl Pattern {
    /// Walk the tree rooted at `dir` using this pattern's criteria.
    pub fn traverse(&self, dir: impl Into<PathBuf>) -> Traversal<'_> {
        Traversal {
            pattern: self,
            stack: vec![Frame::Visit(dir.into())],
            before_leave: None,
        }
    }

    /// Walk the pattern's own root directory.
    pub fn entries(&self) -> Traversal<'_> {
        self.traverse(self.root_dir().to_path_buf())
    }
}

impl<'a> Traversal<'a> {
    /// Run `hook` before each non-root directory is checked for emptiness.
    /// Returning `false` ends the walk.
    pub fn before_leave(mut self, hook: impl FnMut() -> bool + 'a) -> Self {
        self.before_leave = Some(Box::new(hook));
        self
    }

    fn is_root(&self, dir: &Path) -> bool {
        dir == self.pattern.root_dir()
    }

    fn visit(&mut self, dir: PathBuf) {
        let cutoff = self.pattern.cutoff();

        let metadata = match fs::metadata(&dir) {
            Ok(metadata) if metadata.is_dir() => metadata,
            Ok(_) => return,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if self.is_root(&dir) {
                    warn!(dir = %dir.display(), "Directory doesn't exist");
                }
                return;
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to stat directory");
                return;
            }
        };

        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if created >= cutoff {
            debug!(dir = %dir.display(), "Skipping directory younger than offset");
            return;
        }

        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to list directory");
                return;
            }
        };

        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        for entry in listing.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                if self.pattern.sub_dirs() {
                    subdirs.push(entry.path());
                }
                continue;
            }

            if !file_type.is_file()
                || !self
                    .pattern
                    .matches_name(&entry.file_name().to_string_lossy())
            {
                continue;
            }

            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let file = FileSystemEntry::from_metadata(entry.path(), EntryKind::File, &metadata);
            if file.modified < cutoff && file.size >= self.pattern.min_size() {
                files.push(file);
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        subdirs.sort_by(|a, b| compare_dir_names(a, b));

        if !self.is_root(&dir) {
            self.stack.push(Frame::Leave(dir));
        }
        for subdir in subdirs.into_iter().rev() {
            self.stack.push(Frame::Visit(subdir));
        }
        if !files.is_empty() {
            self.stack.push(Frame::Files(files.into_iter()));
        }
    }

    /// The directory as an entry, if it currently has no children at all.
    fn empty_dir_entry(dir: PathBuf) -> Option<FileSystemEntry> {
        let mut listing = fs::read_dir(&dir).ok()?;
        if listing.next().is_some() {
            return None;
        }
        let metadata = fs::metadata(&dir).ok()?;
        Some(FileSystemEntry::from_metadata(
            dir,
            EntryKind::Directory,
            &metadata,
        ))
    }
}

impl Iterator for Traversal<'_> {
    type Item = FileSystemEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Visit(dir) => self.visit(dir),
                Frame::Files(mut files) => {
                    if let Some(file) = files.next() {
                        self.stack.push(Frame::Files(files));
                        return Some(file);
                    }
                }
                Frame::Leave(dir) => {
                    if self.before_leave.as_mut().is_some_and(|hook| !hook()) {
                        self.stack.clear();
                        return None;
                    }
                    if let Some(entry) = Self::empty_dir_entry(dir) {
                        return Some(entry);
                    }
                }
            }
        }
        None
    }
}

/// Shorter names first, then lexicographic. Independent of depth so the
/// processing order is reproducible.
fn compare_dir_names(a: &Path, b: &Path) -> Ordering {
    let a = a.file_name().unwrap_or_default().to_string_lossy();
    let b = b.file_name().unwrap_or_default().to_string_lossy();
    a.chars()
        .count()
        .cmp(&b.chars().count())
        .then_with(|| a.cmp(&b))
}
