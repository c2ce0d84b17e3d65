//! Per-record worker: resolve, transfer, report.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::TransferError;
use crate::resolver::ResolverRegistry;
use crate::transfer::Transfer;
use crate::types::{Event, Record};
use crate::utils::RecordLayout;

/// Everything a worker task needs, cheap to clone into each spawned task
#[derive(Clone)]
pub(super) struct WorkerContext {
    pub(super) transfer: Arc<Transfer>,
    pub(super) resolvers: Arc<ResolverRegistry>,
    pub(super) layout: Arc<RecordLayout>,
    pub(super) event_tx: broadcast::Sender<Event>,
}

impl WorkerContext {
    /// Fetch one record's media to its fixed artifact path
    ///
    /// Never touches the store; the orchestrator persists whatever this
    /// returns.
    pub(super) async fn run(&self, record: &Record) -> Result<PathBuf, TransferError> {
        let url = self.resolvers.resolve(record)?;
        let destination = self.layout.media_path(&record.key);

        tracing::info!(
            source = %record.key.source,
            external_id = %record.key.external_id,
            url = %url,
            "Starting transfer"
        );
        self.event_tx
            .send(Event::TransferStarted {
                key: record.key.clone(),
                url: url.clone(),
            })
            .ok();

        let key = record.key.clone();
        let event_tx = self.event_tx.clone();
        self.transfer
            .fetch(&url, &destination, move |bytes, total| {
                event_tx
                    .send(Event::TransferProgress {
                        key: key.clone(),
                        bytes,
                        total,
                    })
                    .ok();
            })
            .await
    }
}
