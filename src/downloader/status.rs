//! Narrow write interface through which settled outcomes reach the store.

use std::path::Path;

use crate::Result;
use crate::db::Database;
use crate::types::RecordKey;

/// Applies one transfer outcome as one durable transition
///
/// Each call targets a single unique key and writes an absolute state, so
/// implementations must tolerate concurrent calls for different keys without
/// extra coordination. Returns whether a row actually transitioned.
#[async_trait::async_trait]
pub trait StatusUpdater: Send + Sync {
    /// `status = downloaded`, `download_path = path`, error cleared
    async fn mark_downloaded(&self, key: &RecordKey, path: &Path) -> Result<bool>;

    /// `status = failed`, `error = message`, `download_path` untouched
    async fn mark_failed(&self, key: &RecordKey, message: &str) -> Result<bool>;
}

#[async_trait::async_trait]
impl StatusUpdater for Database {
    async fn mark_downloaded(&self, key: &RecordKey, path: &Path) -> Result<bool> {
        Database::mark_downloaded(self, key, path).await
    }

    async fn mark_failed(&self, key: &RecordKey, message: &str) -> Result<bool> {
        Database::mark_failed(self, key, message).await
    }
}
