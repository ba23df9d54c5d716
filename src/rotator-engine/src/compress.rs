//! Compression primitive used by the rotate action.
//!
//! Files are compressed next to themselves: `<name>` -> `<name>.gz`. The
//! original is not touched here; the caller deletes it once compression
//! has succeeded.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of files produced by [`GzipCompressor`] and the only extension
/// the delete action removes without `delete_uncompressed`.
pub const COMPRESSED_EXTENSION: &str = "gz";

/// Temp file suffix for in-progress archives.
const TEMP_SUFFIX: &str = ".tmp";

/// Turns a file into a compressed sibling.
///
/// Implementations are called from blocking worker threads and may run
/// concurrently for different paths.
pub trait Compressor: Send + Sync {
    /// Compress `path`, returning the path of the archive written.
    fn compress(&self, path: &Path) -> io::Result<PathBuf>;
}

/// Gzip compressor backed by `flate2`.
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    level: u32,
}

impl GzipCompressor {
    /// `level` is clamped to `1..=9`.
    pub fn new(level: u32) -> Self {
        Self {
            level: level.clamp(1, 9),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new(6)
    }
}

impl Compressor for GzipCompressor {
    /// Writes to `<name>.gz.tmp`, syncs, then renames into place. Fails with
    /// `AlreadyExists` rather than overwrite an existing archive.
    fn compress(&self, path: &Path) -> io::Result<PathBuf> {
        let gz_path = archive_path(path);
        if gz_path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("archive '{}' already exists", gz_path.display()),
            ));
        }

        let mut temp_name = OsString::from(gz_path.as_os_str());
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        let result = (|| {
            let mut reader = BufReader::new(File::open(path)?);
            let writer = BufWriter::new(File::create(&temp_path)?);
            let mut encoder = GzEncoder::new(writer, Compression::new(self.level));
            io::copy(&mut reader, &mut encoder)?;

            let mut writer = encoder.finish()?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            fs::rename(&temp_path, &gz_path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        debug!(
            source = %path.display(),
            archive = %gz_path.display(),
            "Compressed file"
        );
        Ok(gz_path)
    }
}

/// `<path>.gz`, keeping the original extension in the name.
pub fn archive_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(COMPRESSED_EXTENSION);
    PathBuf::from(name)
}
