//! Local filesystem store.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;

use kvstash_core::error::{AppError, ErrorKind};
use kvstash_core::result::AppResult;
use kvstash_core::traits::storage::{FileEntry, FileStore};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Local filesystem store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    /// Root directory for all stored files.
    root: PathBuf,
}

impl LocalFileStore {
    /// Create a store rooted at `root_path`, creating the directory if needed.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute path within the root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let clean = path.trim_start_matches('/');
        if clean.is_empty() {
            self.root.clone()
        } else {
            self.root.join(clean)
        }
    }

    /// Ensure the parent directory of a path exists.
    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

fn storage_error(action: &str, path: &str, e: std::io::Error) -> AppError {
    if e.kind() == std::io::ErrorKind::NotFound {
        AppError::with_source(ErrorKind::NotFound, format!("Not found: {path}"), e)
    } else {
        AppError::with_source(ErrorKind::Storage, format!("Failed to {action}: {path}"), e)
    }
}

fn entry_from(path: String, meta: &std::fs::Metadata) -> FileEntry {
    FileEntry {
        path,
        size_bytes: meta.len(),
        last_modified: meta.modified().ok().map(chrono::DateTime::<chrono::Utc>::from),
        is_directory: meta.is_dir(),
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    fn store_type(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn create_dir(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path);
        fs::create_dir_all(&full_path)
            .await
            .map_err(|e| storage_error("create directory", path, e))
    }

    async fn read(&self, path: &str) -> AppResult<Bytes> {
        let full_path = self.resolve(path);
        let data = fs::read(&full_path)
            .await
            .map_err(|e| storage_error("read file", path, e))?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, path: &str, data: Bytes, atomic: bool) -> AppResult<()> {
        let full_path = self.resolve(path);
        self.ensure_parent(&full_path).await?;

        if atomic {
            let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
            let mut tmp_name = full_path.clone().into_os_string();
            tmp_name.push(format!(".{}.{seq}.tmp", std::process::id()));
            let tmp_path = PathBuf::from(tmp_name);

            if let Err(e) = fs::write(&tmp_path, &data).await {
                return Err(storage_error("write file", path, e));
            }
            if let Err(e) = fs::rename(&tmp_path, &full_path).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(storage_error("rename file", path, e));
            }
        } else {
            fs::write(&full_path, &data)
                .await
                .map_err(|e| storage_error("write file", path, e))?;
        }

        debug!(path, bytes = data.len(), atomic, "Wrote file");
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> AppResult<bool> {
        let full_path = self.resolve(path);
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error("delete file", path, e)),
        }
    }

    async fn remove_dir(&self, path: &str) -> AppResult<bool> {
        let full_path = self.resolve(path);
        match fs::remove_dir(&full_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error("delete directory", path, e)),
        }
    }

    async fn exists(&self, path: &str) -> AppResult<bool> {
        let full_path = self.resolve(path);
        Ok(fs::try_exists(&full_path).await.unwrap_or(false))
    }

    async fn metadata(&self, path: &str) -> AppResult<FileEntry> {
        let full_path = self.resolve(path);
        let meta = fs::metadata(&full_path)
            .await
            .map_err(|e| storage_error("get metadata", path, e))?;
        Ok(entry_from(path.to_string(), &meta))
    }

    async fn list(&self, path: &str) -> AppResult<Vec<FileEntry>> {
        let full_path = self.resolve(path);
        let mut dir = match fs::read_dir(&full_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error("list directory", path, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to read directory entry", e)
        })? {
            let entry_meta = entry.metadata().await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to get entry metadata", e)
            })?;

            let name = entry.file_name().to_string_lossy().to_string();
            let trimmed = path.trim_matches('/');
            let entry_path = if trimmed.is_empty() {
                name
            } else {
                format!("{trimmed}/{name}")
            };

            entries.push(entry_from(entry_path, &entry_meta));
        }

        entries.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then(a.path.cmp(&b.path))
        });

        Ok(entries)
    }
}
