//! Single-record network-to-disk transfer.
//!
//! - [`watchdog`] - Rolling rate meter and stall rule
//! - [`part_file`] - Temp file guard and atomic rename commit
//!
//! A transfer streams the response body into `<dest>.<suffix>` through a
//! fixed-capacity buffer, so memory stays bounded regardless of payload size.
//! The final path only ever appears via a rename of a complete, synced file.
//! Nothing is resumable: every attempt starts from byte zero.

mod part_file;
mod watchdog;


use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::config::TransferConfig;
use crate::error::{Error, Result, TransferError};

use part_file::PartFile;
use watchdog::StallWatchdog;

/// Streaming HTTP fetcher shared by every worker in a downloader
///
/// Holds one `reqwest::Client`, so connection pools and TLS state are built
/// once per process rather than once per record.
#[derive(Clone, Debug)]
pub struct Transfer {
    client: reqwest::Client,
    config: TransferConfig,
    temp_suffix: String,
}

impl Transfer {
    /// Build the shared client from transfer settings
    pub fn new(config: &TransferConfig, temp_suffix: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            temp_suffix: temp_suffix.to_string(),
        })
    }

    /// Settings this transfer was built with
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Fetch `url` into `destination`
    ///
    /// `on_progress` is called with bytes written so far and the declared
    /// length (if any) each time another buffer's worth has been written, and
    /// once more at the end.
    pub async fn fetch<F>(
        &self,
        url: &str,
        destination: &Path,
        on_progress: F,
    ) -> std::result::Result<PathBuf, TransferError>
    where
        F: FnMut(u64, Option<u64>) + Send,
    {
        let parsed = url::Url::parse(url)
            .map_err(|e| TransferError::Validation(format!("invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransferError::Validation(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Validation(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        let expected = response.content_length();
        tracing::debug!(url, expected_bytes = ?expected, "Response accepted, streaming body");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransferError::from));

        write_stream(
            body,
            expected,
            destination,
            &self.config,
            &self.temp_suffix,
            on_progress,
        )
        .await
    }
}

/// Drain `body` into `destination` with stall detection and atomic commit
///
/// Split from [`Transfer::fetch`] so the write path can be driven by any byte
/// stream.
pub(crate) async fn write_stream<S, B, F>(
    body: S,
    expected: Option<u64>,
    destination: &Path,
    config: &TransferConfig,
    temp_suffix: &str,
    mut on_progress: F,
) -> std::result::Result<PathBuf, TransferError>
where
    S: Stream<Item = std::result::Result<B, TransferError>>,
    B: AsRef<[u8]>,
    F: FnMut(u64, Option<u64>),
{
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TransferError::io("create directory", parent, e))?;
    }

    // Guard first so it drops after the file handle
    let part = PartFile::new(destination, temp_suffix);
    let file = tokio::fs::File::create(part.temp_path())
        .await
        .map_err(|e| TransferError::io("create", part.temp_path(), e))?;
    let mut writer = tokio::io::BufWriter::with_capacity(config.chunk_size, file);

    let mut watchdog = StallWatchdog::new(
        config.stall_grace,
        config.min_rate_bps,
        config.rate_window,
        Instant::now(),
    );
    let step = config.chunk_size as u64;
    let mut written: u64 = 0;
    let mut next_report = step;

    let mut body = std::pin::pin!(body);
    loop {
        // Wake at least every check_interval so a silent peer still gets judged
        let next = tokio::time::timeout(config.check_interval, body.next()).await;
        let now = Instant::now();

        match next {
            Ok(Some(chunk)) => {
                let chunk = chunk?;
                let bytes = chunk.as_ref();
                writer
                    .write_all(bytes)
                    .await
                    .map_err(|e| TransferError::io("write", part.temp_path(), e))?;
                written += bytes.len() as u64;
                watchdog.record(bytes.len() as u64, now);

                if written >= next_report {
                    on_progress(written, expected);
                    next_report = written - (written % step) + step;
                }
            }
            Ok(None) => break,
            Err(_) => {}
        }

        watchdog.check(now)?;
    }

    if let Some(expected) = expected {
        if written != expected {
            return Err(TransferError::Validation(format!(
                "body ended after {} of {} bytes",
                written, expected
            )));
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| TransferError::io("flush", part.temp_path(), e))?;
    let file = writer.into_inner();
    file.sync_all()
        .await
        .map_err(|e| TransferError::io("sync", part.temp_path(), e))?;
    drop(file);

    on_progress(written, expected);
    part.commit().await
}
