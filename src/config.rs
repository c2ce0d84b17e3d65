//! Configuration types for session-ingest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, path::PathBuf, time::Duration};

/// Batch and storage layout settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root of the per-record artifact tree (default: "./data")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Number of transfer slots in the worker pool (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_transfers: usize,

    /// Records selected per run (default: 6)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// File name of the media artifact inside a record directory (default: "video")
    #[serde(default = "default_media_file_name")]
    pub media_file_name: String,

    /// File name of the transcript artifact inside a record directory (default: "transcript.srt")
    #[serde(default = "default_transcript_file_name")]
    pub transcript_file_name: String,

    /// Suffix appended to in-flight files (default: "part")
    #[serde(default = "default_temp_suffix")]
    pub temp_suffix: String,

    /// Delete leftover temp files under `data_dir` on startup (default: true)
    #[serde(default = "default_true")]
    pub sweep_stale_temp_files: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_concurrent_transfers: default_max_concurrent(),
            batch_size: default_batch_size(),
            media_file_name: default_media_file_name(),
            transcript_file_name: default_transcript_file_name(),
            temp_suffix: default_temp_suffix(),
            sweep_stale_temp_files: true,
        }
    }
}

/// Per-transfer network and watchdog settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Overall request timeout including the body (default: 300s)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// TCP connect timeout (default: 30s)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Write buffer capacity in bytes (default: 8 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Time after start before the rate floor is enforced (default: 15s)
    #[serde(default = "default_stall_grace", with = "duration_serde")]
    pub stall_grace: Duration,

    /// Minimum rolling throughput in bytes per second (default: 2 MiB/s)
    #[serde(default = "default_min_rate")]
    pub min_rate_bps: u64,

    /// Width of the sliding window used to measure throughput (default: 5s)
    #[serde(default = "default_rate_window", with = "duration_serde")]
    pub rate_window: Duration,

    /// How often the watchdog re-checks while no bytes arrive (default: 1s)
    #[serde(default = "default_check_interval", with = "duration_serde")]
    pub check_interval: Duration,

    /// User-Agent header sent to origins
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            chunk_size: default_chunk_size(),
            stall_grace: default_stall_grace(),
            min_rate_bps: default_min_rate(),
            rate_window: default_rate_window(),
            check_interval: default_check_interval(),
            user_agent: default_user_agent(),
        }
    }
}

/// Record store settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./session-ingest.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// How each source's records map to direct media URLs
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolverConfig {
    /// Download `origin_url` as is
    Passthrough,
    /// `<base_url>/ArchiveVideoFiles/<external_id>.mp4`
    HouseArchive {
        /// Archive host, e.g. "https://www.house.mi.gov"
        base_url: String,
    },
}

/// Per-source settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Resolver per source name; unknown sources use passthrough
    #[serde(default = "default_resolvers")]
    pub resolvers: HashMap<String, ResolverConfig>,

    /// Default lookback window for discovery in days (default: 14)
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            resolvers: default_resolvers(),
            lookback_days: default_lookback_days(),
        }
    }
}

/// Main configuration for [`Downloader`](crate::Downloader)
///
/// - [`download`](DownloadConfig) - data directory, pool size, batch size, file layout
/// - [`transfer`](TransferConfig) - timeouts, buffer size, stall watchdog
/// - [`persistence`](PersistenceConfig) - database location
/// - [`sources`](SourcesConfig) - media URL resolution and discovery window
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Batch and storage layout settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Per-transfer network and watchdog settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Record store settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Per-source settings
    #[serde(default)]
    pub sources: SourcesConfig,
}

impl Config {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_transfers == 0 {
            return Err(Error::config(
                "must be at least 1",
                "max_concurrent_transfers",
            ));
        }
        if self.download.batch_size == 0 {
            return Err(Error::config("must be at least 1", "batch_size"));
        }
        if self.transfer.chunk_size == 0 {
            return Err(Error::config("must be at least 1 byte", "chunk_size"));
        }
        if self.transfer.check_interval.is_zero() {
            return Err(Error::config("must be non-zero", "check_interval"));
        }
        if self.transfer.rate_window.is_zero() {
            return Err(Error::config("must be non-zero", "rate_window"));
        }
        for (key, name) in [
            ("media_file_name", &self.download.media_file_name),
            ("transcript_file_name", &self.download.transcript_file_name),
        ] {
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(Error::config(
                    format!("'{}' is not a plain file name", name),
                    key,
                ));
            }
        }
        if self.download.temp_suffix.is_empty() || self.download.temp_suffix.contains(['/', '\\'])
        {
            return Err(Error::config(
                "must be a non-empty plain suffix",
                "temp_suffix",
            ));
        }
        if self.download.media_file_name == self.download.transcript_file_name {
            return Err(Error::config(
                "media and transcript artifacts must have different names",
                "transcript_file_name",
            ));
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_batch_size() -> usize {
    6
}

fn default_media_file_name() -> String {
    "video".to_string()
}

fn default_transcript_file_name() -> String {
    "transcript.srt".to_string()
}

fn default_temp_suffix() -> String {
    "part".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_chunk_size() -> usize {
    8 * 1024 * 1024
}

fn default_stall_grace() -> Duration {
    Duration::from_secs(15)
}

fn default_min_rate() -> u64 {
    2 * 1024 * 1024
}

fn default_rate_window() -> Duration {
    Duration::from_secs(5)
}

fn default_check_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_user_agent() -> String {
    concat!("session-ingest/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./session-ingest.db")
}

fn default_resolvers() -> HashMap<String, ResolverConfig> {
    HashMap::from([(
        "house".to_string(),
        ResolverConfig::HouseArchive {
            base_url: "https://www.house.mi.gov".to_string(),
        },
    )])
}

fn default_lookback_days() -> u32 {
    14
}

// Durations are written as whole seconds, or fractional seconds for sub-second values
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_u64(duration.as_secs())
        } else {
            serializer.serialize_f64(duration.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.download.max_concurrent_transfers, 3);
        assert_eq!(config.download.batch_size, 6);
        assert_eq!(config.download.media_file_name, "video");
        assert_eq!(config.download.temp_suffix, "part");
        assert_eq!(config.transfer.request_timeout, Duration::from_secs(300));
        assert_eq!(config.transfer.chunk_size, 8 * 1024 * 1024);
        assert_eq!(config.transfer.stall_grace, Duration::from_secs(15));
        assert_eq!(config.transfer.min_rate_bps, 2 * 1024 * 1024);
        assert!(matches!(
            config.sources.resolvers.get("house"),
            Some(ResolverConfig::HouseArchive { .. })
        ));
        config.validate().unwrap();
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.download.batch_size, 6);
        assert_eq!(config.transfer.check_interval, Duration::from_secs(1));
    }

    #[test]
    fn durations_accept_fractional_seconds() {
        let config: Config =
            serde_json::from_str(r#"{"transfer": {"stall_grace": 0.25, "request_timeout": 60}}"#)
                .unwrap();
        assert_eq!(config.transfer.stall_grace, Duration::from_millis(250));
        assert_eq!(config.transfer.request_timeout, Duration::from_secs(60));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["transfer"]["request_timeout"], 60);
        assert_eq!(json["transfer"]["stall_grace"], 0.25);
    }

    #[test]
    fn resolver_config_is_tagged() {
        let config: Config = serde_json::from_str(
            r#"{"sources": {"resolvers": {"senate": {"kind": "passthrough"}}}}"#,
        )
        .unwrap();
        assert_eq!(
            config.sources.resolvers.get("senate"),
            Some(&ResolverConfig::Passthrough)
        );
        assert!(!config.sources.resolvers.contains_key("house"));
    }

    #[test]
    fn validate_rejects_zero_pool() {
        let mut config = Config::default();
        config.download.max_concurrent_transfers = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("max_concurrent_transfers"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_path_like_file_names() {
        let mut config = Config::default();
        config.download.media_file_name = "../escape".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.download.temp_suffix = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.download.transcript_file_name = "video".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_json_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"download": {"batch_size": 2}}"#).unwrap();
        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.download.batch_size, 2);

        std::fs::write(&path, r#"{"download": {"batch_size": 0}}"#).unwrap();
        assert!(Config::from_json_file(&path).is_err());
    }
}
