//! Database layer for session-ingest
//!
//! Handles SQLite persistence for discovered records and their lifecycle.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by concern:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`records`] - Upsert, batch selection and status transitions
//!
//! Rows are read as [`RecordRow`] and converted once into the typed
//! [`Record`] at this boundary; nothing past the store looks fields up by name.

use crate::error::DatabaseError;
use crate::types::{Record, RecordKey, RecordStatus};
use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod migrations;
mod records;

/// Record row from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    /// Origin system
    pub source: String,
    /// Identifier unique within `source`
    pub external_id: String,
    /// Display name
    pub title: String,
    /// ISO `YYYY-MM-DD`
    pub publish_date: String,
    /// Locator the scraper discovered
    pub origin_url: String,
    /// Local artifact path
    pub download_path: Option<String>,
    /// Transcript artifact path
    pub transcript_path: Option<String>,
    /// Lowercase status text
    pub status: String,
    /// Last failure cause
    pub error: Option<String>,
    /// Unix timestamp of insertion
    pub discovered_at: i64,
}

impl TryFrom<RecordRow> for Record {
    type Error = DatabaseError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let status: RecordStatus = row.status.parse().map_err(|e: String| {
            DatabaseError::CorruptRow(format!("{}/{}: {}", row.source, row.external_id, e))
        })?;
        let publish_date = NaiveDate::parse_from_str(&row.publish_date, "%Y-%m-%d").map_err(|e| {
            DatabaseError::CorruptRow(format!(
                "{}/{}: bad publish_date '{}': {}",
                row.source, row.external_id, row.publish_date, e
            ))
        })?;

        Ok(Record {
            key: RecordKey {
                source: row.source,
                external_id: row.external_id,
            },
            title: row.title,
            publish_date,
            origin_url: row.origin_url,
            download_path: row.download_path.map(PathBuf::from),
            transcript_path: row.transcript_path.map(PathBuf::from),
            status,
            error: row.error,
            discovered_at: Utc
                .timestamp_opt(row.discovered_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
        })
    }
}

/// Database handle for session-ingest
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
