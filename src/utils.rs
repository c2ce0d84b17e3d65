//! Utility functions for artifact layout and temp file handling

use crate::config::DownloadConfig;
use crate::types::RecordKey;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Fixed on-disk layout: `<data_dir>/<source>/<external_id>/<artifact>`
#[derive(Clone, Debug)]
pub struct RecordLayout {
    data_dir: PathBuf,
    media_file_name: String,
    transcript_file_name: String,
    temp_suffix: String,
}

impl RecordLayout {
    /// Build the layout from download settings
    pub fn new(config: &DownloadConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            media_file_name: config.media_file_name.clone(),
            transcript_file_name: config.transcript_file_name.clone(),
            temp_suffix: config.temp_suffix.clone(),
        }
    }

    /// Root of the artifact tree
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory owned by one record
    pub fn record_dir(&self, key: &RecordKey) -> PathBuf {
        self.data_dir
            .join(sanitize_component(&key.source))
            .join(sanitize_component(&key.external_id))
    }

    /// Final path of the media artifact
    pub fn media_path(&self, key: &RecordKey) -> PathBuf {
        self.record_dir(key).join(&self.media_file_name)
    }

    /// Final path of the transcript artifact
    pub fn transcript_path(&self, key: &RecordKey) -> PathBuf {
        self.record_dir(key).join(&self.transcript_file_name)
    }

    /// Suffix reserved for in-flight files
    pub fn temp_suffix(&self) -> &str {
        &self.temp_suffix
    }
}

/// Encode an identifier as a single path component
///
/// Everything outside `[A-Za-z0-9._~-]` is percent-encoded (including `%`
/// itself), so distinct identifiers always map to distinct components. The
/// special names `.` and `..` have their dots escaped and the empty string
/// becomes a lone `%`, which no encoded identifier can produce.
///
/// # Examples
///
/// ```
/// use session_ingest::utils::sanitize_component;
///
/// assert_eq!(sanitize_component("20240101"), "20240101");
/// assert_eq!(sanitize_component("../etc/passwd"), "..%2Fetc%2Fpasswd");
/// assert_eq!(sanitize_component(".."), "%2E%2E");
/// assert_ne!(sanitize_component("a b"), sanitize_component("a_b"));
/// ```
pub fn sanitize_component(raw: &str) -> String {
    match raw {
        "" => "%".to_string(),
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => urlencoding::encode(raw).into_owned(),
    }
}

/// Sibling path used while `path` is being written: `<name>.<suffix>`
pub fn temp_sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Delete leftover `*.<suffix>` files beneath `root`
///
/// Drop guards remove temp files on every in-process failure path; this
/// catches what a hard crash left behind. Returns the number removed.
pub fn sweep_temp_files(root: &Path, suffix: &str) -> std::io::Result<usize> {
    if !root.exists() {
        return Ok(0);
    }

    let ending = format!(".{}", suffix);
    let mut removed = 0;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_temp = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(&ending));
        if is_temp {
            std::fs::remove_file(entry.path())?;
            tracing::debug!(path = %entry.path().display(), "Removed stale temp file");
            removed += 1;
        }
    }

    Ok(removed)
}
