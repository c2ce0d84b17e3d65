//! # session-ingest
//!
//! Download core for legislative session recordings.
//!
//! Scrapers discover recordings and file them as records in a SQLite store.
//! The [`Downloader`] selects the newest eligible records, fetches each one on
//! a bounded pool of workers and persists every outcome as a single durable
//! state transition. A downstream transcription step picks up what was
//! downloaded.
//!
//! ## Record lifecycle
//!
//! ```text
//! discovered ──ok──▶ downloaded ──▶ transcribed
//!      │                 ▲
//!      └──err──▶ failed ─┘ (reselected every batch)
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use session_ingest::{Config, Downloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.download.data_dir = "/var/lib/sessions".into();
//!     config.download.max_concurrent_transfers = 3;
//!
//!     let downloader = Downloader::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = downloader.run_next_batch().await?;
//!     println!("{} downloaded, {} failed", summary.succeeded, summary.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Record store
pub mod db;
/// Batch orchestration and discovery intake
pub mod downloader;
/// Error types
pub mod error;
/// Media URL resolution per source
pub mod resolver;
/// Streaming HTTP transfer with stall detection
pub mod transfer;
/// Core types and events
pub mod types;
/// Artifact layout and filesystem helpers
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, PersistenceConfig, ResolverConfig, SourcesConfig, TransferConfig};
pub use db::Database;
pub use downloader::{Downloader, ScraperSource, StatusUpdater};
pub use error::{DatabaseError, Error, Result, TransferError};
pub use resolver::{HouseArchiveResolver, MediaResolver, PassthroughResolver, ResolverRegistry};
pub use types::{
    BatchSummary, Event, IngestSummary, NewRecord, Record, RecordKey, RecordStatus,
};
pub use utils::RecordLayout;
