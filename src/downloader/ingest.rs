//! Discovery intake: run scrapers and store what they find.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};

use crate::error::Result;
use crate::types::{IngestSummary, NewRecord};

use super::Downloader;

/// A producer of candidate records for one origin system
#[async_trait::async_trait]
pub trait ScraperSource: Send + Sync {
    /// Source name the candidates are filed under; candidates carrying any
    /// other `source` are rejected
    fn source(&self) -> &str;

    /// Candidates published on or after `since`
    async fn discover(&self, since: NaiveDate) -> Result<Vec<NewRecord>>;
}

impl Downloader {
    /// Run every scraper over the last `lookback_days` days and store new candidates
    pub async fn ingest(
        &self,
        scrapers: &[Arc<dyn ScraperSource>],
        lookback_days: u32,
    ) -> Result<IngestSummary> {
        let today = Utc::now().date_naive();
        let since = today
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        self.ingest_since(scrapers, since).await
    }

    /// Run every scraper and store candidates published on or after `since`
    ///
    /// Candidates whose `source` differs from [`ScraperSource::source`] are
    /// dropped and counted in [`IngestSummary::wrong_source`].
    /// A scraper that fails is logged and listed in
    /// [`IngestSummary::failed_sources`]; the others still run. Store errors
    /// are returned.
    pub async fn ingest_since(
        &self,
        scrapers: &[Arc<dyn ScraperSource>],
        since: NaiveDate,
    ) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();

        for scraper in scrapers {
            let source = scraper.source().to_string();
            let candidates = match scraper.discover(since).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "Scraper failed, skipping");
                    summary.failed_sources.push(source);
                    continue;
                }
            };

            let found = candidates.len();
            let (own, foreign): (Vec<NewRecord>, Vec<NewRecord>) =
                candidates.into_iter().partition(|c| c.source == source);
            for candidate in &foreign {
                tracing::warn!(
                    source = %source,
                    candidate_source = %candidate.source,
                    external_id = %candidate.external_id,
                    "Dropping candidate filed under another source"
                );
            }
            let fresh: Vec<NewRecord> = own
                .into_iter()
                .filter(|c| c.publish_date >= since)
                .collect();
            let skipped = found - foreign.len() - fresh.len();

            let inserted = self.db.upsert_if_absent(&fresh).await?;
            tracing::info!(
                source = %source,
                found,
                inserted,
                skipped_old = skipped,
                "Ingested scraper results"
            );

            summary.inserted += inserted;
            summary.skipped_old += skipped;
            summary.wrong_source += foreign.len();
        }

        Ok(summary)
    }
}
