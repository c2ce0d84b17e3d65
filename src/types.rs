//! Core types and events for session-ingest

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identity of a record: unique per `(source, external_id)`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Origin system, e.g. "house" or "senate"
    pub source: String,
    /// Identifier unique within `source`
    pub external_id: String,
}

impl RecordKey {
    /// Create a new key
    pub fn new(source: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            external_id: external_id.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.source, self.external_id)
    }
}

/// Lifecycle status of a record
///
/// ```text
/// Discovered --success--> Downloaded --(downstream)--> Transcribed
/// Discovered --failure--> Failed
/// Failed     --success--> Downloaded
/// Failed     --failure--> Failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Found by a scraper, not yet fetched
    Discovered,
    /// Media artifact committed to disk
    Downloaded,
    /// Last transfer attempt failed; eligible again
    Failed,
    /// Transcript produced by the downstream collaborator
    Transcribed,
}

impl RecordStatus {
    /// Text stored in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Discovered => "discovered",
            RecordStatus::Downloaded => "downloaded",
            RecordStatus::Failed => "failed",
            RecordStatus::Transcribed => "transcribed",
        }
    }

    /// Whether the batch selector may pick a record in this state
    pub fn is_eligible(&self) -> bool {
        matches!(self, RecordStatus::Discovered | RecordStatus::Failed)
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovered" => Ok(RecordStatus::Discovered),
            "downloaded" => Ok(RecordStatus::Downloaded),
            "failed" => Ok(RecordStatus::Failed),
            "transcribed" => Ok(RecordStatus::Transcribed),
            other => Err(format!("unknown record status '{}'", other)),
        }
    }
}

/// Candidate produced by a scraper, before it is stored
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Origin system
    pub source: String,
    /// Identifier unique within `source`
    pub external_id: String,
    /// Display name; `None` falls back to `external_id`
    pub title: Option<String>,
    /// Date of the recorded session
    pub publish_date: NaiveDate,
    /// Locator the scraper discovered
    pub origin_url: String,
}

impl NewRecord {
    /// Identity of the record this candidate would create
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.source, &self.external_id)
    }
}

/// A stored record with its lifecycle state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identity
    pub key: RecordKey,
    /// Display name
    pub title: String,
    /// Date of the recorded session
    pub publish_date: NaiveDate,
    /// Locator the scraper discovered
    pub origin_url: String,
    /// Set once a local artifact exists
    pub download_path: Option<PathBuf>,
    /// Set by the transcription collaborator
    pub transcript_path: Option<PathBuf>,
    /// Lifecycle status
    pub status: RecordStatus,
    /// Last failure cause
    pub error: Option<String>,
    /// When the record was first inserted
    pub discovered_at: DateTime<Utc>,
}

/// Aggregate outcome of one orchestrator run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Records committed as downloaded
    pub succeeded: usize,
    /// Records recorded as failed
    pub failed: usize,
    /// Records not dispatched, or whose outcome the store refused because
    /// they were no longer eligible
    #[serde(default)]
    pub skipped: usize,
}

impl BatchSummary {
    /// Total persisted outcomes
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Outcome of one discovery intake pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Candidates that created a new record
    pub inserted: usize,
    /// Candidates dropped for predating the cutoff
    pub skipped_old: usize,
    /// Candidates dropped for naming a different source than their scraper
    pub wrong_source: usize,
    /// Sources whose scraper failed this pass
    pub failed_sources: Vec<String>,
}

/// Event emitted by the downloader
///
/// Subscribers receive these over a broadcast channel; a lagging subscriber
/// misses events but never slows the workers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch was selected and is about to be dispatched
    BatchStarted {
        /// Number of records in the batch
        records: usize,
    },

    /// A worker obtained a slot and began its transfer
    TransferStarted {
        /// Record being fetched
        key: RecordKey,
        /// Resolved media URL
        url: String,
    },

    /// Bytes written so far for a transfer
    TransferProgress {
        /// Record being fetched
        key: RecordKey,
        /// Bytes written to the temp file
        bytes: u64,
        /// Declared size, if the origin sent one
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    /// Artifact committed and status persisted
    Downloaded {
        /// Record that succeeded
        key: RecordKey,
        /// Final artifact path
        path: PathBuf,
    },

    /// Failure persisted
    Failed {
        /// Record that failed
        key: RecordKey,
        /// Stored cause text
        error: String,
    },

    /// Every worker in the batch has settled
    BatchFinished {
        /// Aggregate counts
        summary: BatchSummary,
    },
}
