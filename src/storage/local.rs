//! Local filesystem helpers.
//!
//! Every file the aggregator publishes or persists is written through
//! [`write_atomic`]: bytes go to a temp file in the destination directory,
//! are synced, then renamed over the target. Readers see either the previous
//! file or the new one, never a partial write.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

/// A fully written temp file waiting to replace its target.
#[derive(Debug)]
pub struct StagedWrite {
    tmp: PathBuf,
    target: PathBuf,
}

impl StagedWrite {
    /// Write and sync `bytes` next to `target` without touching `target`.
    pub async fn stage(target: &Path, bytes: &[u8]) -> Result<Self> {
        ensure_parent(target).await?;

        let tmp = temp_path(target);
        let staged = Self {
            tmp,
            target: target.to_path_buf(),
        };
        if let Err(e) = write_synced(&staged.tmp, bytes).await {
            staged.discard().await;
            return Err(e);
        }
        Ok(staged)
    }

    pub fn temp_path(&self) -> &Path {
        &self.tmp
    }

    /// Rename the temp file over the target.
    pub async fn commit(self) -> Result<()> {
        if let Err(e) = tokio::fs::rename(&self.tmp, &self.target).await {
            self.discard().await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    /// Remove the temp file, leaving the target untouched.
    pub async fn discard(self) {
        match tokio::fs::remove_file(&self.tmp).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                log::warn!("Could not remove temp file {}: {}", self.tmp.display(), e);
            }
            _ => {}
        }
    }
}

/// Write bytes atomically (write to temp, sync, then rename).
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    StagedWrite::stage(path, bytes).await?.commit().await
}

/// Write pretty JSON atomically.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes).await
}

/// Read bytes, returning None if the file doesn't exist.
pub async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Read JSON data, returning None if the file doesn't exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_bytes(path).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            tokio::fs::create_dir_all(parent).await?;
        }
        _ => {}
    }
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

/// Hidden sibling of `target`, unique per process.
fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    target.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}
