//! Temp-file-then-rename commit with cleanup on every other exit.

use std::path::{Path, PathBuf};

use crate::error::TransferError;
use crate::utils::temp_sibling;

/// Owns the `<final>.<suffix>` sibling of a destination until it is committed
///
/// Dropping an uncommitted guard deletes the temp file. That covers early
/// returns, `?` propagation and the task being aborted mid-write.
#[derive(Debug)]
pub(crate) struct PartFile {
    temp_path: PathBuf,
    final_path: PathBuf,
    armed: bool,
}

impl PartFile {
    pub(crate) fn new(final_path: &Path, suffix: &str) -> Self {
        Self {
            temp_path: temp_sibling(final_path, suffix),
            final_path: final_path.to_path_buf(),
            armed: true,
        }
    }

    pub(crate) fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Atomically replace the destination with the fully written temp file
    pub(crate) async fn commit(mut self) -> Result<PathBuf, TransferError> {
        tokio::fs::rename(&self.temp_path, &self.final_path)
            .await
            .map_err(|e| TransferError::io("rename", &self.temp_path, e))?;
        self.armed = false;
        sync_parent(&self.final_path).await?;
        Ok(std::mem::take(&mut self.final_path))
    }
}

/// Flush the directory entry created by the rename
#[cfg(unix)]
async fn sync_parent(path: &Path) -> Result<(), TransferError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => return Ok(()),
    };
    let dir = tokio::fs::File::open(parent)
        .await
        .map_err(|e| TransferError::io("open directory", parent, e))?;
    dir.sync_all()
        .await
        .map_err(|e| TransferError::io("sync directory", parent, e))
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) -> Result<(), TransferError> {
    Ok(())
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => {
                tracing::debug!(path = %self.temp_path.display(), "Removed partial download");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.temp_path.display(),
                    error = %e,
                    "Failed to remove partial download"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drop_removes_uncommitted_temp() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video");
        let part = PartFile::new(&dest, "part");
        std::fs::write(part.temp_path(), b"partial").unwrap();
        let temp = part.temp_path().to_path_buf();

        drop(part);

        assert!(!temp.exists());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn commit_renames_and_disarms() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video");
        std::fs::write(&dest, b"old").unwrap();
        let part = PartFile::new(&dest, "part");
        std::fs::write(part.temp_path(), b"new").unwrap();
        let temp = part.temp_path().to_path_buf();

        let committed = part.commit().await.unwrap();

        assert_eq!(committed, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn commit_into_nested_directory_syncs_parent() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("senate").join("a%20b").join("video");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        let part = PartFile::new(&dest, "part");
        std::fs::write(part.temp_path(), b"media").unwrap();

        assert_eq!(part.commit().await.unwrap(), dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"media");

        // A bare file name syncs the current directory
        sync_parent(Path::new("video")).await.unwrap();
    }

    #[tokio::test]
    async fn failed_commit_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        // Destination is a non-empty directory, so the rename fails
        let dest = dir.path().join("video");
        std::fs::create_dir_all(dest.join("occupied")).unwrap();
        let part = PartFile::new(&dest, "part");
        std::fs::write(part.temp_path(), b"data").unwrap();
        let temp = part.temp_path().to_path_buf();

        let err = part.commit().await.unwrap_err();

        assert_eq!(err.kind(), "io");
        assert!(!temp.exists());
    }
}
