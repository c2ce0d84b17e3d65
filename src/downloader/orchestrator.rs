//! Bounded worker pool over one batch, persisting each outcome as it settles.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Error, Result, TransferError};
use crate::types::{BatchSummary, Event, Record, RecordKey};

use super::Downloader;

type Outcome = std::result::Result<PathBuf, TransferError>;

impl Downloader {
    /// Select the next batch of eligible records, newest first
    pub async fn select_batch(&self, limit: usize) -> Result<Vec<Record>> {
        self.db.select_eligible_batch(limit).await
    }

    /// Select a batch of the configured size and run it
    pub async fn run_next_batch(&self) -> Result<BatchSummary> {
        let batch = self.select_batch(self.config.download.batch_size).await?;
        self.run(batch).await
    }

    /// Download every record in `batch` on a pool of `max_concurrent_transfers` slots
    ///
    /// One task per record. A transfer failure (or a panicking worker) only
    /// affects its own record. Each outcome is written through the
    /// [`StatusUpdater`](super::StatusUpdater) the moment its task settles,
    /// so a crash mid-batch keeps everything settled so far. Returns once all
    /// tasks have settled.
    ///
    /// Each record's status is re-read from the store first. Records that are
    /// no longer `discovered` or `failed` (or no longer exist) are never
    /// dispatched, so an artifact handed downstream is not overwritten; they
    /// are counted as `skipped`. Only outcomes the store actually applied are
    /// counted as `succeeded` or `failed`.
    ///
    /// A store write failure aborts the run: the remaining tasks are
    /// cancelled (their temp files are removed) and the error is returned.
    pub async fn run(&self, batch: Vec<Record>) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        let batch = self.current_eligible(batch, &mut summary).await?;

        if batch.is_empty() {
            tracing::info!(skipped = summary.skipped, "No records to download");
            return Ok(summary);
        }

        let workers = self.config.download.max_concurrent_transfers;
        tracing::info!(records = batch.len(), workers, "Starting download batch");
        self.event_tx
            .send(Event::BatchStarted {
                records: batch.len(),
            })
            .ok();

        let slots = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        for record in batch {
            let slots = Arc::clone(&slots);
            let worker = self.worker.clone();
            tasks.spawn(async move {
                // The semaphore lives for the whole run and is never closed
                let _permit = slots.acquire_owned().await;
                let outcome = AssertUnwindSafe(worker.run(&record))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(TransferError::Panicked(panic_message(&*panic))));
                (record.key, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (key, outcome) = match joined {
                Ok(settled) => settled,
                Err(e) => {
                    // Panics are caught inside the task; only cancellation lands here
                    tracing::error!(error = %e, "Worker task ended without an outcome");
                    tasks.shutdown().await;
                    return Err(Error::Other(format!("worker task failed: {}", e)));
                }
            };

            if let Err(e) = self.apply_outcome(&key, outcome, &mut summary).await {
                tracing::error!(
                    source = %key.source,
                    external_id = %key.external_id,
                    error = %e,
                    "Failed to persist outcome, aborting batch"
                );
                tasks.shutdown().await;
                return Err(e);
            }
        }

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Download batch finished"
        );
        self.event_tx.send(Event::BatchFinished { summary }).ok();
        Ok(summary)
    }

    /// Refresh every record from the store and keep only the eligible ones
    async fn current_eligible(
        &self,
        batch: Vec<Record>,
        summary: &mut BatchSummary,
    ) -> Result<Vec<Record>> {
        let mut eligible = Vec::with_capacity(batch.len());
        for record in batch {
            match self.db.get_record(&record.key).await? {
                Some(current) if current.status.is_eligible() => eligible.push(current),
                current => {
                    tracing::warn!(
                        source = %record.key.source,
                        external_id = %record.key.external_id,
                        status = current.as_ref().map(|r| r.status.as_str()).unwrap_or("missing"),
                        "Skipping record that is not eligible for download"
                    );
                    summary.skipped += 1;
                }
            }
        }
        Ok(eligible)
    }

    async fn apply_outcome(
        &self,
        key: &RecordKey,
        outcome: Outcome,
        summary: &mut BatchSummary,
    ) -> Result<()> {
        match outcome {
            Ok(path) => {
                if !self.status.mark_downloaded(key, &path).await? {
                    tracing::warn!(
                        source = %key.source,
                        external_id = %key.external_id,
                        "Record was not eligible when its download committed"
                    );
                    summary.skipped += 1;
                    return Ok(());
                }
                tracing::info!(
                    source = %key.source,
                    external_id = %key.external_id,
                    path = %path.display(),
                    "Download committed"
                );
                summary.succeeded += 1;
                self.event_tx
                    .send(Event::Downloaded {
                        key: key.clone(),
                        path,
                    })
                    .ok();
            }
            Err(e) => {
                let cause = e.cause();
                tracing::warn!(
                    source = %key.source,
                    external_id = %key.external_id,
                    kind = e.kind(),
                    error = %e,
                    "Download failed"
                );
                if !self.status.mark_failed(key, &cause).await? {
                    tracing::warn!(
                        source = %key.source,
                        external_id = %key.external_id,
                        "Record was not eligible when its failure was recorded"
                    );
                    summary.skipped += 1;
                    return Ok(());
                }
                summary.failed += 1;
                self.event_tx
                    .send(Event::Failed {
                        key: key.clone(),
                        error: cause,
                    })
                    .ok();
            }
        }
        Ok(())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
