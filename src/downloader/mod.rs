//! Download orchestration split into focused submodules.
//!
//! The [`Downloader`] struct and its methods are organized by concern:
//! - [`orchestrator`] - Batch selection and the bounded worker pool
//! - [`worker`] - One record's resolve + transfer
//! - [`status`] - The outcome-to-store interface
//! - [`ingest`] - Scraper intake with per-source failure isolation

mod ingest;
mod orchestrator;
mod status;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use ingest::ScraperSource;
pub use status::StatusUpdater;

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::resolver::ResolverRegistry;
use crate::transfer::Transfer;
use crate::types::Event;
use crate::utils::{RecordLayout, sweep_temp_files};

use worker::WorkerContext;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Download core: selects eligible records, runs them on a bounded pool and
/// records each outcome
#[derive(Clone)]
pub struct Downloader {
    pub(crate) db: Database,
    pub(crate) config: Arc<Config>,
    status: Arc<dyn StatusUpdater>,
    worker: WorkerContext,
    event_tx: broadcast::Sender<Event>,
}

impl Downloader {
    /// Open the configured database and build a downloader around it
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let db = Database::new(&config.persistence.database_path).await?;
        Self::with_database(config, db).await
    }

    /// Build a downloader over an already-open database
    ///
    /// Sweeps leftover temp files under the data directory when
    /// `sweep_stale_temp_files` is set.
    pub async fn with_database(config: Config, db: Database) -> Result<Self> {
        config.validate()?;

        let layout = RecordLayout::new(&config.download);
        if config.download.sweep_stale_temp_files {
            let root = layout.data_dir().to_path_buf();
            let suffix = layout.temp_suffix().to_string();
            let removed = tokio::task::spawn_blocking(move || sweep_temp_files(&root, &suffix))
                .await
                .map_err(|e| crate::error::Error::Other(format!("temp sweep task failed: {}", e)))??;
            if removed > 0 {
                tracing::info!(removed, "Removed stale temp files from a previous run");
            }
        }

        let transfer = Transfer::new(&config.transfer, &config.download.temp_suffix)?;
        let resolvers = ResolverRegistry::from_config(&config.sources)?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let worker = WorkerContext {
            transfer: Arc::new(transfer),
            resolvers: Arc::new(resolvers),
            layout: Arc::new(layout),
            event_tx: event_tx.clone(),
        };

        Ok(Self {
            status: Arc::new(db.clone()),
            db,
            config: Arc::new(config),
            worker,
            event_tx,
        })
    }

    /// Route outcomes through a different [`StatusUpdater`]
    ///
    /// The default writes straight to the record store.
    pub fn with_status_updater(mut self, status: Arc<dyn StatusUpdater>) -> Self {
        self.status = status;
        self
    }

    /// Replace the media resolvers built from config
    pub fn with_resolvers(mut self, resolvers: ResolverRegistry) -> Self {
        self.worker.resolvers = Arc::new(resolvers);
        self
    }

    /// Subscribe to downloader events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The record store
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Artifact layout
    pub fn layout(&self) -> &RecordLayout {
        &self.worker.layout
    }
}
