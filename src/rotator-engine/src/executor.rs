//! Bounded-concurrency batch execution for a single pattern.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::compress::{Compressor, GzipCompressor};
use crate::operation::EntryOperation;
use crate::pattern::Pattern;
use crate::traversal::FileSystemEntry;
use crate::{Result, RotatorError};

/// At most `MAX_BATCH_MULTIPLIER * batch_cap` operations are launched per call.
pub const MAX_BATCH_MULTIPLIER: usize = 10;

/// Walker to executor messages.
enum Walk {
    Entry(FileSystemEntry),
    /// Finish every in-flight operation, then acknowledge. Sent before a
    /// directory is checked for emptiness so its deletions are visible.
    Settle(oneshot::Sender<()>),
}

impl Pattern {
    /// Run one batch using the default gzip compressor.
    pub async fn execute(&self, batch_cap: usize, cancel: &CancellationToken) -> Result<usize> {
        self.execute_with(Arc::new(GzipCompressor::default()), batch_cap, cancel)
            .await
    }

    /// Drain eligible entries and apply the pattern's action to them.
    ///
    /// At most `batch_cap` operations are in flight at once and at most
    /// `MAX_BATCH_MULTIPLIER * batch_cap` are launched in total; whatever is
    /// left is picked up by the next call. Cancellation is checked before
    /// each launch; operations already launched always run to completion.
    ///
    /// When the pattern prunes directories, the walker pauses before each
    /// emptiness check until the operations launched so far have finished,
    /// so a directory emptied by this batch is removed by this batch.
    ///
    /// Returns the number of operations that succeeded. Per-entry failures
    /// are logged and never surface as an error here; an error means the
    /// directory walker itself died.
    pub async fn execute_with(
        &self,
        compressor: Arc<dyn Compressor>,
        batch_cap: usize,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let batch_cap = batch_cap.max(1);
        let launch_limit = batch_cap.saturating_mul(MAX_BATCH_MULTIPLIER);
        let operation = EntryOperation::for_pattern(self, compressor);

        let (tx, mut rx) = mpsc::channel::<Walk>(1);
        let pattern = self.clone();
        let walker = tokio::task::spawn_blocking(move || {
            let mut entries = pattern.entries();
            if pattern.prunes_dirs() {
                let settle = tx.clone();
                entries = entries.before_leave(move || {
                    let (done, settled) = oneshot::channel();
                    settle.blocking_send(Walk::Settle(done)).is_ok()
                        && settled.blocking_recv().is_ok()
                });
            }

            for entry in entries {
                if !pattern.accepts(&entry) {
                    continue;
                }
                if tx.blocking_send(Walk::Entry(entry)).is_err() {
                    // Receiver dropped: the batch stopped early.
                    break;
                }
            }
        });

        let mut in_flight = JoinSet::new();
        let mut started = 0usize;
        let mut processed = 0usize;

        while let Some(message) = rx.recv().await {
            if cancel.is_cancelled() {
                debug!(pattern = %self, "Cancellation requested, not launching further entries");
                break;
            }
            let entry = match message {
                Walk::Entry(entry) => entry,
                Walk::Settle(done) => {
                    while let Some(outcome) = in_flight.join_next().await {
                        processed += succeeded(outcome);
                    }
                    let _ = done.send(());
                    continue;
                }
            };
            if started >= launch_limit {
                debug!(pattern = %self, launch_limit, "Batch launch limit reached");
                break;
            }

            while in_flight.len() >= batch_cap {
                match in_flight.join_next().await {
                    Some(outcome) => processed += succeeded(outcome),
                    None => break,
                }
            }

            let operation = operation.clone();
            in_flight.spawn_blocking(move || operation.apply(&entry));
            started += 1;
        }
        drop(rx);

        while let Some(outcome) = in_flight.join_next().await {
            processed += succeeded(outcome);
        }

        walker
            .await
            .map_err(|e| RotatorError::Traversal(e.to_string()))?;

        if started > 0 {
            info!(
                pattern = %self,
                started,
                processed,
                failed = started - processed,
                "Batch completed"
            );
        }

        Ok(processed)
    }
}

fn succeeded(outcome: std::result::Result<bool, JoinError>) -> usize {
    match outcome {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(e) => {
            error!(error = %e, "Entry operation panicked");
            0
        }
    }
}
