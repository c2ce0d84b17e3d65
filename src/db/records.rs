//! Record upsert, batch selection and status transitions.
//!
//! Every transition is one keyed `UPDATE` that writes an absolute new state,
//! so concurrent calls for different records never contend beyond SQLite's
//! own write lock.

use std::path::Path;

use crate::error::DatabaseError;
use crate::types::{NewRecord, Record, RecordKey};
use crate::{Error, Result};

use super::{Database, RecordRow};

const RECORD_COLUMNS: &str = "source, external_id, title, publish_date, origin_url, \
     download_path, transcript_path, status, error, discovered_at";

fn query_failed(what: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(DatabaseError::QueryFailed(format!("Failed to {}: {}", what, e)))
}

fn into_records(rows: Vec<RecordRow>) -> Result<Vec<Record>> {
    rows.into_iter()
        .map(Record::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn positive_limit(limit: usize) -> Result<i64> {
    if limit == 0 {
        return Err(Error::config("limit must be greater than zero", "limit"));
    }
    Ok(i64::try_from(limit).unwrap_or(i64::MAX))
}

impl Database {
    /// Insert records that are not already known
    ///
    /// A `(source, external_id)` already present is skipped silently. Returns
    /// how many rows were actually created.
    pub async fn upsert_if_absent(&self, records: &[NewRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(query_failed("begin upsert"))?;
        let mut inserted = 0usize;

        for record in records {
            let title = record
                .title
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(&record.external_id);

            let result = sqlx::query(
                r#"
                INSERT INTO videos (
                    source, external_id, title, publish_date, origin_url,
                    status, discovered_at
                ) VALUES (?, ?, ?, ?, ?, 'discovered', ?)
                ON CONFLICT (source, external_id) DO NOTHING
                "#,
            )
            .bind(&record.source)
            .bind(&record.external_id)
            .bind(title)
            .bind(record.publish_date.format("%Y-%m-%d").to_string())
            .bind(&record.origin_url)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(query_failed("insert record"))?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(query_failed("commit upsert"))?;
        Ok(inserted)
    }

    /// Get a record by identity
    pub async fn get_record(&self, key: &RecordKey) -> Result<Option<Record>> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM videos WHERE source = ? AND external_id = ?",
            RECORD_COLUMNS
        ))
        .bind(&key.source)
        .bind(&key.external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("get record"))?;

        row.map(Record::try_from)
            .transpose()
            .map_err(Error::from)
    }

    /// List every record, newest session first
    pub async fn list_records(&self) -> Result<Vec<Record>> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM videos ORDER BY publish_date DESC, discovered_at ASC, external_id ASC",
            RECORD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("list records"))?;

        into_records(rows)
    }

    /// Select up to `limit` records that still need downloading
    ///
    /// Only `discovered` and `failed` rows qualify, newest `publish_date`
    /// first.
    pub async fn select_eligible_batch(&self, limit: usize) -> Result<Vec<Record>> {
        let limit = positive_limit(limit)?;
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            SELECT {}
            FROM videos
            WHERE status IN ('discovered', 'failed')
            ORDER BY publish_date DESC, discovered_at ASC, external_id ASC
            LIMIT ?
            "#,
            RECORD_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("select eligible batch"))?;

        into_records(rows)
    }

    /// Select up to `limit` downloaded records awaiting transcription
    pub async fn select_downloaded(&self, limit: usize) -> Result<Vec<Record>> {
        let limit = positive_limit(limit)?;
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            SELECT {}
            FROM videos
            WHERE status = 'downloaded'
            ORDER BY publish_date DESC, discovered_at ASC, external_id ASC
            LIMIT ?
            "#,
            RECORD_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("select downloaded records"))?;

        into_records(rows)
    }

    /// Record a committed artifact
    ///
    /// Clears any previous error. Returns `false` when no eligible row matched
    /// (unknown key, or the record already moved past `failed`).
    pub async fn mark_downloaded(&self, key: &RecordKey, path: &Path) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = 'downloaded', download_path = ?, error = NULL
            WHERE source = ? AND external_id = ?
              AND status IN ('discovered', 'failed')
            "#,
        )
        .bind(path.to_string_lossy().into_owned())
        .bind(&key.source)
        .bind(&key.external_id)
        .execute(&self.pool)
        .await
        .map_err(query_failed("mark record downloaded"))?;

        Ok(result.rows_affected() == 1)
    }

    /// Record a failed transfer, leaving `download_path` as it was
    pub async fn mark_failed(&self, key: &RecordKey, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = 'failed', error = ?
            WHERE source = ? AND external_id = ?
              AND status IN ('discovered', 'failed')
            "#,
        )
        .bind(error)
        .bind(&key.source)
        .bind(&key.external_id)
        .execute(&self.pool)
        .await
        .map_err(query_failed("mark record failed"))?;

        Ok(result.rows_affected() == 1)
    }

    /// Record a transcript written by the transcription collaborator
    pub async fn mark_transcribed(&self, key: &RecordKey, transcript_path: &Path) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = 'transcribed', transcript_path = ?
            WHERE source = ? AND external_id = ? AND status = 'downloaded'
            "#,
        )
        .bind(transcript_path.to_string_lossy().into_owned())
        .bind(&key.source)
        .bind(&key.external_id)
        .execute(&self.pool)
        .await
        .map_err(query_failed("mark record transcribed"))?;

        Ok(result.rows_affected() == 1)
    }
}
