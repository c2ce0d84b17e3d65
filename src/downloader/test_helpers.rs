//! Shared test helpers for creating Downloader instances in tests.

use crate::config::{Config, ResolverConfig};
use crate::downloader::Downloader;
use crate::types::NewRecord;
use chrono::NaiveDate;
use std::path::Path;
use tempfile::tempdir;

/// Config rooted in `root`, with the house archive pointed at `archive_base`
pub(crate) fn test_config(root: &Path, archive_base: &str) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = root.join("test.db");
    config.download.data_dir = root.join("data");
    config.download.max_concurrent_transfers = 3;
    config.transfer.check_interval = std::time::Duration::from_millis(20);
    config.sources.resolvers.insert(
        "house".to_string(),
        ResolverConfig::HouseArchive {
            base_url: archive_base.to_string(),
        },
    );
    config
}

/// Helper to create a test Downloader with a persistent database.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(archive_base: &str) -> (Downloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path(), archive_base);
    let downloader = Downloader::new(config).await.unwrap();
    (downloader, temp_dir)
}

/// A `house` candidate; its media resolves to `/ArchiveVideoFiles/<id>.mp4`
pub(crate) fn house_record(external_id: &str, date: &str) -> NewRecord {
    NewRecord {
        source: "house".to_string(),
        external_id: external_id.to_string(),
        title: Some(format!("House session {}", external_id)),
        publish_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        origin_url: format!(
            "https://house.mi.gov/VideoArchivePlayer?video={}.mp4",
            external_id
        ),
    }
}

/// A candidate whose media is fetched from `origin_url` as is
pub(crate) fn direct_record(source: &str, external_id: &str, date: &str, url: &str) -> NewRecord {
    NewRecord {
        source: source.to_string(),
        external_id: external_id.to_string(),
        title: None,
        publish_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        origin_url: url.to_string(),
    }
}

/// A local URL nothing is listening on
pub(crate) fn unused_local_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/video.mp4", port)
}

/// Every file under `dir` ending in `.<suffix>`
pub(crate) fn temp_files_under(dir: &Path, suffix: &str) -> Vec<std::path::PathBuf> {
    let ending = format!(".{}", suffix);
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(&ending))
        .map(|e| e.into_path())
        .collect()
}
