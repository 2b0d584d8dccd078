//! File-system helper trait used by the file cache backend.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::result::AppResult;

/// Metadata about an entry in the file store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileEntry {
    /// Path relative to the store root.
    pub path: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modified timestamp.
    pub last_modified: Option<DateTime<Utc>>,
    /// Whether this is a directory.
    pub is_directory: bool,
}

/// Primitive file operations rooted at a base directory.
///
/// All paths are relative to the store root. Implementations take no locks:
/// concurrent writers to the same path race with last-writer-wins.
#[async_trait]
pub trait FileStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the store type name (e.g., "local").
    fn store_type(&self) -> &str;

    /// Whether the store root exists and is a directory.
    async fn health_check(&self) -> AppResult<bool>;

    /// Create a directory and any missing parents. Existing directories are fine.
    async fn create_dir(&self, path: &str) -> AppResult<()>;

    /// Read a whole file. A missing file is a `NotFound` error.
    async fn read(&self, path: &str) -> AppResult<Bytes>;

    /// Write a file, replacing any previous content and creating parents.
    ///
    /// With `atomic` the content is written to a sibling temp file first and
    /// renamed over the target, so readers never observe a partial file.
    async fn write(&self, path: &str, data: Bytes, atomic: bool) -> AppResult<()>;

    /// Delete a file. Returns `false` if it did not exist.
    async fn remove_file(&self, path: &str) -> AppResult<bool>;

    /// Delete an empty directory. Returns `false` if it did not exist.
    async fn remove_dir(&self, path: &str) -> AppResult<bool>;

    /// Whether a file or directory exists at the path.
    async fn exists(&self, path: &str) -> AppResult<bool>;

    /// Metadata for a single path.
    async fn metadata(&self, path: &str) -> AppResult<FileEntry>;

    /// List a directory. A missing directory lists as empty.
    async fn list(&self, path: &str) -> AppResult<Vec<FileEntry>>;
}
