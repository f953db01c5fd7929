//! Local upload store.
//!
//! Layout: `<root>/<batch_id>/<seq>-<name>`. Each browser session owns one
//! batch directory, so concurrent users never see each other's files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use woof_models::{BatchId, UploadedImage};

use crate::error::{StorageError, StorageResult};
use crate::names::{is_image_name, parse_stored_name, stored_name, validate_stored_name};

/// Default upload root, relative to the working directory.
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";

const WRITE_CHECK_FILE: &str = ".write-check";

/// Filesystem store for uploaded images.
#[derive(Debug)]
pub struct UploadStore {
    root: PathBuf,
    seq: AtomicU64,
}

impl UploadStore {
    /// Open (and create if needed) the upload root.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!(root = %root.display(), "Upload store ready");
        Ok(Self {
            root,
            seq: AtomicU64::new(1),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one batch.
    pub fn batch_dir(&self, batch_id: &BatchId) -> PathBuf {
        self.root.join(batch_id.as_str())
    }

    /// Path of a stored file, after validating the name.
    pub fn file_path(&self, batch_id: &BatchId, file_name: &str) -> StorageResult<PathBuf> {
        validate_stored_name(file_name)?;
        Ok(self.batch_dir(batch_id).join(file_name))
    }

    /// Persist one uploaded image into the batch.
    pub async fn save(
        &self,
        batch_id: &BatchId,
        original_name: &str,
        bytes: &[u8],
    ) -> StorageResult<UploadedImage> {
        check_upload(original_name, bytes)?;

        let dir = self.batch_dir(batch_id);
        fs::create_dir_all(&dir).await?;

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let file_name = stored_name(seq, original_name);
        let path = dir.join(&file_name);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", path.display(), e)))?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(
            batch_id = %batch_id,
            file = %file_name,
            size = bytes.len(),
            "Stored upload"
        );

        Ok(UploadedImage {
            batch_id: batch_id.clone(),
            file_name,
            original_name: original_name.to_string(),
            size_bytes: bytes.len() as u64,
            uploaded_at: Utc::now(),
        })
    }

    /// Stored images of a batch in upload order. A missing batch is empty.
    pub async fn list(&self, batch_id: &BatchId) -> StorageResult<Vec<UploadedImage>> {
        let dir = self.batch_dir(batch_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut images = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            let Some((seq, original)) = parse_stored_name(&file_name) else {
                continue;
            };
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let uploaded_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            images.push((
                seq,
                UploadedImage {
                    batch_id: batch_id.clone(),
                    original_name: original.to_string(),
                    file_name: file_name.clone(),
                    size_bytes: metadata.len(),
                    uploaded_at,
                },
            ));
        }

        images.sort_by_key(|(seq, _)| *seq);
        Ok(images.into_iter().map(|(_, image)| image).collect())
    }

    /// Delete one stored file. A file that is already gone is not an error.
    pub async fn remove(&self, batch_id: &BatchId, file_name: &str) -> StorageResult<()> {
        let path = self.file_path(batch_id, file_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::delete_failed(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Delete a batch and everything in it. Returns the number of files removed.
    pub async fn purge(&self, batch_id: &BatchId) -> StorageResult<usize> {
        let count = self.list(batch_id).await?.len();
        match fs::remove_dir_all(self.batch_dir(batch_id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(StorageError::delete_failed(format!("batch {}: {}", batch_id, e)))
            }
        }
        debug!(batch_id = %batch_id, files = count, "Purged batch");
        Ok(count)
    }

    /// Delete every batch directory under the root.
    ///
    /// Entries whose names are not batch ids are left alone.
    pub async fn purge_all(&self) -> StorageResult<usize> {
        let batches = self.batches().await?;
        let mut purged = 0;
        for (batch_id, _) in &batches {
            self.purge(batch_id).await?;
            purged += 1;
        }
        if purged > 0 {
            info!(batches = purged, "Purged all upload batches");
        }
        Ok(purged)
    }

    /// Delete batches not modified within `ttl`, except those `keep` selects.
    /// Returns the purged ids.
    pub async fn purge_expired(
        &self,
        ttl: Duration,
        keep: impl Fn(&BatchId) -> bool,
    ) -> StorageResult<Vec<BatchId>> {
        let now = SystemTime::now();
        let mut expired = Vec::new();

        for (batch_id, modified) in self.batches().await? {
            let idle = now.duration_since(modified).unwrap_or_default();
            if idle < ttl || keep(&batch_id) {
                continue;
            }
            match self.purge(&batch_id).await {
                Ok(_) => expired.push(batch_id),
                Err(e) => warn!(batch_id = %batch_id, error = %e, "Failed to purge expired batch"),
            }
        }

        Ok(expired)
    }

    /// Batch directories with their last modification time.
    pub async fn batches(&self) -> StorageResult<Vec<(BatchId, SystemTime)>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut batches = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(batch_id) = name.to_str().and_then(|n| BatchId::parse(n).ok()) else {
                continue;
            };
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }
            let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
            batches.push((batch_id, modified));
        }
        Ok(batches)
    }

    /// Verify the root accepts writes (readiness check).
    pub async fn check_writable(&self) -> StorageResult<()> {
        let marker = self.root.join(WRITE_CHECK_FILE);
        fs::write(&marker, b"ok").await?;
        fs::remove_file(&marker).await?;
        Ok(())
    }
}

/// Check that an upload can be stored: image extension and non-empty body.
pub fn check_upload(original_name: &str, bytes: &[u8]) -> StorageResult<()> {
    if !is_image_name(original_name) {
        return Err(StorageError::UnsupportedType(original_name.to_string()));
    }
    if bytes.is_empty() {
        return Err(StorageError::EmptyUpload(original_name.to_string()));
    }
    Ok(())
}
