//! Multi-pattern scheduler.
//!
//! Runs one independent polling loop per pattern. A loop that processed
//! something goes straight back for more; a loop that found nothing sleeps
//! the poll interval. Stopping cancels every loop and waits for all of them.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::compress::{Compressor, GzipCompressor};
use crate::pattern::Pattern;
use crate::{Result, RotatorError};

/// Concurrent operations allowed per pattern per batch.
pub const DEFAULT_BATCH_CAP: usize = 10;

#[derive(Clone)]
struct RunningLoops {
    cancel: CancellationToken,
    loops: TaskTracker,
}

/// Rotation engine owning every configured pattern.
pub struct Rotator {
    poll_interval: Duration,
    patterns: Vec<Arc<Pattern>>,
    compressor: Arc<dyn Compressor>,
    batch_cap: usize,
    running: Mutex<Option<RunningLoops>>,
}

impl Rotator {
    /// Create a stopped rotator.
    ///
    /// `poll_interval` must be at least one millisecond and `patterns` must
    /// not be empty.
    pub fn new(poll_interval: Duration, patterns: Vec<Pattern>) -> Result<Self> {
        if poll_interval < Duration::from_millis(1) {
            return Err(RotatorError::InvalidPollInterval(
                poll_interval.as_millis() as u64
            ));
        }
        if patterns.is_empty() {
            return Err(RotatorError::NoPatterns);
        }

        Ok(Self {
            poll_interval,
            patterns: patterns.into_iter().map(Arc::new).collect(),
            compressor: Arc::new(GzipCompressor::default()),
            batch_cap: DEFAULT_BATCH_CAP,
            running: Mutex::new(None),
        })
    }

    pub fn with_batch_cap(mut self, batch_cap: usize) -> Self {
        self.batch_cap = batch_cap.max(1);
        self
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn batch_cap(&self) -> usize {
        self.batch_cap
    }

    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter().map(|p| p.as_ref())
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Spawn one loop per pattern on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(RotatorError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let loops = TaskTracker::new();
        for pattern in &self.patterns {
            loops.spawn(run_pattern_loop(
                Arc::clone(pattern),
                Arc::clone(&self.compressor),
                self.batch_cap,
                self.poll_interval,
                cancel.clone(),
            ));
        }
        loops.close();

        *running = Some(RunningLoops { cancel, loops });
        info!(
            patterns = self.patterns.len(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Log rotator started"
        );
        Ok(())
    }

    /// Cancel every loop and wait until all of them have exited.
    ///
    /// Batches already in progress finish their launched operations first.
    /// The rotator stays running until every loop is gone, so dropping this
    /// future early leaves it running (and `start` rejected); call `stop`
    /// again to finish. The rotator can be started again afterwards.
    pub async fn stop(&self) -> Result<()> {
        let running = self.running.lock().clone();
        let Some(RunningLoops { cancel, loops }) = running else {
            return Err(RotatorError::NotRunning);
        };

        cancel.cancel();
        loops.wait().await;
        *self.running.lock() = None;

        info!("Log rotator stopped");
        Ok(())
    }

    /// Run a single batch for every pattern in order and return the total
    /// number of entries processed.
    pub async fn run_once(&self) -> Result<usize> {
        if self.is_running() {
            return Err(RotatorError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let mut total = 0;
        for pattern in &self.patterns {
            info!(pattern = %pattern, "Processing pattern");
            match pattern
                .execute_with(Arc::clone(&self.compressor), self.batch_cap, &cancel)
                .await
            {
                Ok(processed) => total += processed,
                Err(e) => error!(pattern = %pattern, error = %e, "Pattern execution failed"),
            }
        }
        Ok(total)
    }
}

impl Drop for Rotator {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

async fn run_pattern_loop(
    pattern: Arc<Pattern>,
    compressor: Arc<dyn Compressor>,
    batch_cap: usize,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    info!(pattern = %pattern, "Pattern loop started");

    while !cancel.is_cancelled() {
        let processed = match pattern
            .execute_with(Arc::clone(&compressor), batch_cap, &cancel)
            .await
        {
            Ok(processed) => processed,
            Err(e) => {
                error!(pattern = %pattern, error = %e, "Pattern execution failed");
                0
            }
        };

        if processed > 0 {
            continue;
        }

        debug!(
            pattern = %pattern,
            poll_interval_ms = poll_interval.as_millis() as u64,
            "Nothing processed, waiting for next poll"
        );
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    info!(pattern = %pattern, "Pattern loop stopped");
}
