//! Batch execution tests: concurrency bound, launch ceiling, per-entry
//! failure isolation and empty-directory pruning.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use rotator_engine::{Compressor, Pattern, PatternAction};

// =============================================================================
// Helpers
// =============================================================================

const HOUR: Duration = Duration::from_secs(3_600);

fn old_file(path: &Path, size: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![b'x'; size]).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() - HOUR)
        .unwrap();
}

/// Directories must be strictly older than `now - offset`; with a zero
/// offset a short pause is enough.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

/// Compressor double that records how many calls overlap.
struct TrackingCompressor {
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    delay: Duration,
}

impl TrackingCompressor {
    fn new(delay: Duration) -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            delay,
        }
    }
}

impl Compressor for TrackingCompressor {
    fn compress(&self, path: &Path) -> io::Result<PathBuf> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        std::thread::sleep(self.delay);

        let archive = PathBuf::from(format!("{}.gz", path.display()));
        let result = fs::write(&archive, b"");
        self.current.fetch_sub(1, Ordering::SeqCst);
        result.map(|_| archive)
    }
}

struct FailingCompressor;

impl Compressor for FailingCompressor {
    fn compress(&self, _path: &Path) -> io::Result<PathBuf> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }
}

// =============================================================================
// Concurrency bound and launch ceiling
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_operations_never_exceed_batch_cap() {
    let temp = TempDir::new().unwrap();
    for i in 0..12 {
        old_file(&temp.path().join(format!("app-{i:02}.log")), 10);
    }
    settle().await;

    let compressor = Arc::new(TrackingCompressor::new(Duration::from_millis(30)));
    let pattern = Pattern::new(PatternAction::Rotate, temp.path(), "*.log").unwrap();

    let processed = pattern
        .execute_with(compressor.clone(), 3, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(processed, 12);
    assert_eq!(compressor.calls.load(Ordering::SeqCst), 12);
    let peak = compressor.peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak in-flight was {peak}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_launches_at_most_ten_batches_per_call() {
    let temp = TempDir::new().unwrap();
    for i in 0..25 {
        old_file(&temp.path().join(format!("old-{i:02}.txt")), 1);
    }
    settle().await;

    let pattern = Pattern::new(PatternAction::Delete, temp.path(), "*.txt")
        .unwrap()
        .with_delete_uncompressed(true);
    let cancel = CancellationToken::new();

    assert_eq!(pattern.execute(2, &cancel).await.unwrap(), 20);
    assert_eq!(file_count(temp.path()), 5);
    assert_eq!(pattern.execute(2, &cancel).await.unwrap(), 5);
    assert_eq!(pattern.execute(2, &cancel).await.unwrap(), 0);
    assert_eq!(file_count(temp.path()), 0);
}

#[tokio::test]
async fn test_cancelled_token_launches_nothing() {
    let temp = TempDir::new().unwrap();
    old_file(&temp.path().join("a.log.gz"), 1);
    settle().await;

    let pattern = Pattern::new(PatternAction::Delete, temp.path(), "*.gz").unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert_eq!(pattern.execute(10, &cancel).await.unwrap(), 0);
    assert!(temp.path().join("a.log.gz").exists());
}

#[tokio::test]
async fn test_missing_root_processes_nothing() {
    let temp = TempDir::new().unwrap();
    let pattern = Pattern::new(PatternAction::Delete, temp.path().join("nope"), "*").unwrap();

    assert_eq!(
        pattern.execute(10, &CancellationToken::new()).await.unwrap(),
        0
    );
}

// =============================================================================
// Rotate
// =============================================================================

#[tokio::test]
async fn test_rotate_compresses_and_removes_original() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("a.log");
    old_file(&log, 64);
    settle().await;

    let pattern = Pattern::new(PatternAction::Rotate, temp.path(), "*.log").unwrap();
    let processed = pattern
        .execute(10, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(processed, 1);
    assert!(!log.exists());
    assert!(temp.path().join("a.log.gz").exists());
}

#[tokio::test]
async fn test_rotate_compression_failure_keeps_original_and_is_not_counted() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("a.log");
    old_file(&log, 64);
    settle().await;

    let pattern = Pattern::new(PatternAction::Rotate, temp.path(), "*.log").unwrap();
    let processed = pattern
        .execute_with(Arc::new(FailingCompressor), 10, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(processed, 0);
    assert!(log.exists());
}

#[tokio::test]
async fn test_rotate_respects_min_size() {
    let temp = TempDir::new().unwrap();
    old_file(&temp.path().join("big.log"), 2048);
    old_file(&temp.path().join("tiny.log"), 10);
    settle().await;

    let pattern = Pattern::new(PatternAction::Rotate, temp.path(), "*.log")
        .unwrap()
        .with_min_size(1024);
    let processed = pattern
        .execute(10, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(processed, 1);
    assert!(temp.path().join("big.log.gz").exists());
    assert!(temp.path().join("tiny.log").exists());
}

#[tokio::test]
async fn test_rotate_never_removes_directories() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("empty")).unwrap();
    settle().await;

    let pattern = Pattern::new(PatternAction::Rotate, temp.path(), "*.log")
        .unwrap()
        .with_sub_dirs(true)
        .with_prune_empty_dirs(true);

    assert_eq!(
        pattern.execute(10, &CancellationToken::new()).await.unwrap(),
        0
    );
    assert!(temp.path().join("empty").is_dir());
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_protects_uncompressed_files() {
    let temp = TempDir::new().unwrap();
    let text = temp.path().join("b.txt");
    old_file(&text, 8);
    settle().await;

    let guarded = Pattern::new(PatternAction::Delete, temp.path(), "*.txt").unwrap();
    assert_eq!(
        guarded.execute(10, &CancellationToken::new()).await.unwrap(),
        0
    );
    assert!(text.exists());

    let allowed = guarded.clone().with_delete_uncompressed(true);
    assert_eq!(
        allowed.execute(10, &CancellationToken::new()).await.unwrap(),
        1
    );
    assert!(!text.exists());
}

#[tokio::test]
async fn test_failures_do_not_abort_siblings() {
    let temp = TempDir::new().unwrap();
    old_file(&temp.path().join("a.log.gz"), 8);
    old_file(&temp.path().join("b.log"), 8);
    old_file(&temp.path().join("c.log.gz"), 8);
    settle().await;

    let pattern = Pattern::new(PatternAction::Delete, temp.path(), "*").unwrap();
    let processed = pattern
        .execute(1, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(processed, 2);
    assert!(temp.path().join("b.log").exists());
    assert_eq!(file_count(temp.path()), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delete_prunes_emptied_subdirectories_in_the_same_pass() {
    for _ in 0..10 {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        old_file(&root.join("x/y/old.log.gz"), 8);
        old_file(&root.join("keep/recent.txt"), 8);
        settle().await;

        let pattern = Pattern::new(PatternAction::Delete, root, "*.gz")
            .unwrap()
            .with_sub_dirs(true)
            .with_prune_empty_dirs(true);
        let cancel = CancellationToken::new();

        // old.log.gz, then y/, then x/
        assert_eq!(pattern.execute(10, &cancel).await.unwrap(), 3);
        assert!(!root.join("x").exists());
        assert!(root.join("keep/recent.txt").exists());
        assert!(root.exists());

        assert_eq!(pattern.execute(10, &cancel).await.unwrap(), 0);
    }
}

#[tokio::test]
async fn test_delete_without_prune_keeps_empty_subdirectories() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    old_file(&root.join("x/old.log.gz"), 8);
    settle().await;

    let pattern = Pattern::new(PatternAction::Delete, root, "*.gz")
        .unwrap()
        .with_sub_dirs(true);
    let cancel = CancellationToken::new();

    assert_eq!(pattern.execute(10, &cancel).await.unwrap(), 1);
    assert_eq!(pattern.execute(10, &cancel).await.unwrap(), 0);
    assert!(root.join("x").is_dir());
}
