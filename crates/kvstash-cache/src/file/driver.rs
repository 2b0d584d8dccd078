//! File-backed cache driver.

use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, info, warn};

use kvstash_core::clock::{Clock, SystemClock};
use kvstash_core::config::cache::{CacheConfig, DriverKind};
use kvstash_core::error::AppError;
use kvstash_core::result::AppResult;
use kvstash_core::traits::cache::CacheDriver;
use kvstash_core::traits::storage::FileStore;
use kvstash_core::value::as_counter;
use kvstash_storage::LocalFileStore;

use super::record::{CacheRecord, decode_payload, encode_payload};
use crate::keys;

/// Stores each entry as one record file under a root directory.
///
/// Expiration is lazy: an expired record is deleted by the first `get` or
/// `has` that notices it. There is no locking between processes sharing a
/// directory.
#[derive(Debug, Clone)]
pub struct FileDriver {
    /// File-system helper rooted at the cache directory.
    store: Arc<dyn FileStore>,
    /// Clock used for expiration checks.
    clock: Arc<dyn Clock>,
    /// Default TTL in seconds.
    default_expire: u64,
    /// Sub-directory that scopes this cache's records.
    prefix: String,
    /// Whether records are sharded by hash prefix.
    subdir: bool,
    /// Whether payloads are zlib-compressed.
    compress: bool,
}

impl FileDriver {
    /// Create a driver rooted at `config.path`, creating the directory.
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        if config.path.trim().is_empty() {
            return Err(AppError::configuration("config required path"));
        }
        let store = LocalFileStore::new(&config.path).await?;
        info!(
            root = %store.root().display(),
            prefix = %config.prefix,
            "Initialized file cache driver"
        );
        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Create a driver over an existing file store.
    pub fn with_store(store: Arc<dyn FileStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            default_expire: config.expire,
            prefix: config.prefix.trim_matches('/').to_string(),
            subdir: config.cache_subdir,
            compress: config.data_compress,
        }
    }

    /// Replace the clock used for expiration checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The underlying file-system helper.
    pub fn handler(&self) -> &Arc<dyn FileStore> {
        &self.store
    }

    /// Read a record and return its value if it is still live.
    async fn read_live(&self, path: &str) -> Option<Value> {
        let raw = match self.store.read(path).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => return None,
            Err(e) => {
                warn!(path, error = %e, "Failed to read cache record");
                return None;
            }
        };

        let record = match CacheRecord::decode(&raw) {
            Ok(record) => record,
            Err(e) => {
                debug!(path, error = %e, "Ignoring unreadable cache record");
                return None;
            }
        };

        if record.expire != 0 && self.is_expired(path, record.expire).await {
            debug!(path, expire = record.expire, "Cache record expired");
            if let Err(e) = self.store.remove_file(path).await {
                warn!(path, error = %e, "Failed to delete expired cache record");
            }
            return None;
        }

        match decode_payload(&record.payload, self.compress) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(path, error = %e, "Ignoring undecodable cache payload");
                None
            }
        }
    }

    /// Whether a record written at its mtime has outlived `expire` seconds.
    async fn is_expired(&self, path: &str, expire: u64) -> bool {
        let modified = match self.store.metadata(path).await {
            Ok(meta) => meta.last_modified,
            // Gone between read and stat.
            Err(_) => return true,
        };
        let Some(modified) = modified else {
            return false;
        };
        let deadline = modified
            .timestamp()
            .saturating_add(i64::try_from(expire).unwrap_or(i64::MAX));
        self.clock.now().timestamp() > deadline
    }

    /// Read-modify-write a counter. Not atomic across writers.
    async fn apply_step(
        &self,
        name: &str,
        op: impl FnOnce(i64) -> Option<i64> + Send,
    ) -> AppResult<i64> {
        let current = match self.get(name).await? {
            Some(value) => as_counter(&value).ok_or_else(|| {
                AppError::validation(format!("Cached value of '{name}' is not an integer"))
            })?,
            None => 0,
        };
        let next = op(current)
            .ok_or_else(|| AppError::validation(format!("Counter '{name}' would overflow")))?;

        // The default expire is applied again; a custom TTL is not carried over.
        if !self.set(name, &Value::from(next), None).await? {
            return Err(AppError::storage(format!("Failed to persist counter '{name}'")));
        }
        Ok(next)
    }
}

#[async_trait]
impl CacheDriver for FileDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::File
    }

    fn cache_key(&self, name: &str) -> String {
        keys::record_path(name, &self.prefix, self.subdir)
    }

    async fn get(&self, name: &str) -> AppResult<Option<Value>> {
        Ok(self.read_live(&self.cache_key(name)).await)
    }

    async fn set(&self, name: &str, value: &Value, expire: Option<u64>) -> AppResult<bool> {
        let expire = expire.unwrap_or(self.default_expire);
        let path = self.cache_key(name);

        let bytes = match encode_payload(value, self.compress)
            .and_then(|payload| CacheRecord::new(expire, payload).encode())
        {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(name, error = %e, "Failed to encode cache record");
                return Ok(false);
            }
        };

        if let Some((shard, _)) = path.rsplit_once('/') {
            if let Err(e) = self.store.create_dir(shard).await {
                warn!(name, dir = %shard, error = %e, "Failed to create cache directory");
                return Ok(false);
            }
        }

        match self.store.write(&path, Bytes::from(bytes), true).await {
            Ok(()) => {
                debug!(name, path = %path, expire, "Stored cache record");
                Ok(true)
            }
            Err(e) => {
                warn!(name, path = %path, error = %e, "Failed to write cache record");
                Ok(false)
            }
        }
    }

    async fn inc(&self, name: &str, step: i64) -> AppResult<i64> {
        self.apply_step(name, |n| n.checked_add(step)).await
    }

    async fn dec(&self, name: &str, step: i64) -> AppResult<i64> {
        self.apply_step(name, |n| n.checked_sub(step)).await
    }

    async fn has(&self, name: &str) -> AppResult<bool> {
        Ok(self.get(name).await?.is_some())
    }

    async fn remove(&self, name: &str) -> AppResult<bool> {
        self.remove_key(&self.cache_key(name)).await
    }

    async fn clear(&self) -> AppResult<bool> {
        let mut failures = 0usize;
        let mut dirs = Vec::new();
        let mut pending = vec![self.prefix.clone()];

        while let Some(dir) = pending.pop() {
            let entries = match self.store.list(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir, error = %e, "Failed to list cache directory");
                    failures += 1;
                    continue;
                }
            };
            for entry in entries {
                if entry.is_directory {
                    pending.push(entry.path.clone());
                    dirs.push(entry.path);
                } else if let Err(e) = self.store.remove_file(&entry.path).await {
                    warn!(path = %entry.path, error = %e, "Failed to delete cache record");
                    failures += 1;
                }
            }
        }

        // Deepest directories first so parents are empty when reached.
        dirs.sort_by_key(|d| Reverse(d.matches('/').count()));
        for dir in dirs {
            if let Err(e) = self.store.remove_dir(&dir).await {
                warn!(dir = %dir, error = %e, "Failed to delete cache directory");
                failures += 1;
            }
        }

        info!(prefix = %self.prefix, failures, "Cleared file cache");
        Ok(failures == 0)
    }

    async fn has_key(&self, key: &str) -> AppResult<bool> {
        Ok(self.read_live(key).await.is_some())
    }

    async fn remove_key(&self, key: &str) -> AppResult<bool> {
        match self.store.remove_file(key).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(path = key, error = %e, "Failed to delete cache record");
                Ok(false)
            }
        }
    }

    async fn ping(&self) -> AppResult<bool> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use kvstash_core::clock::ManualClock;
    use serde_json::json;

    async fn make_driver(config: CacheConfig) -> (tempfile::TempDir, FileDriver, ManualClock) {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            path: dir.path().to_str().unwrap().to_string(),
            ..config
        };
        let clock = ManualClock::starting_now();
        let driver = FileDriver::new(&config)
            .await
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (dir, driver, clock)
    }

    #[tokio::test]
    async fn test_missing_path_is_configuration_error() {
        let err = FileDriver::new(&CacheConfig::default()).await.unwrap_err();
        assert_eq!(err.kind, kvstash_core::error::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let (_dir, driver, _clock) = make_driver(CacheConfig::default()).await;
        let value = json!({"a": 1, "list": [1, 2, 3], "s": "x"});
        assert!(driver.set("x", &value, None).await.unwrap());
        assert_eq!(driver.get("x").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_record_lands_at_mapped_path() {
        let (dir, driver, _clock) = make_driver(CacheConfig {
            prefix: "app".into(),
            ..CacheConfig::default()
        })
        .await;
        driver.set("x", &json!(1), Some(30)).await.unwrap();

        let path = driver.cache_key("x");
        assert_eq!(path, keys::record_path("x", "app", true));
        let raw = std::fs::read(dir.path().join(&path)).unwrap();
        assert!(raw.starts_with(b"KVSTASH\n000000000030"));
    }

    #[tokio::test]
    async fn test_set_creates_shard_directory() {
        let (dir, driver, _clock) = make_driver(CacheConfig::default()).await;
        assert!(driver.set("x", &json!(1), None).await.unwrap());

        let path = driver.cache_key("x");
        let (shard, _) = path.rsplit_once('/').unwrap();
        assert!(dir.path().join(shard).is_dir());
    }

    #[tokio::test]
    async fn test_set_returns_false_when_directory_blocked() {
        let (dir, driver, _clock) = make_driver(CacheConfig {
            prefix: "blocked".into(),
            ..CacheConfig::default()
        })
        .await;
        // A regular file where the prefix directory should be.
        std::fs::write(dir.path().join("blocked"), b"not a dir").unwrap();

        assert!(!driver.set("x", &json!(1), None).await.unwrap());
        assert_eq!(driver.get("x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let (_dir, driver, _clock) = make_driver(CacheConfig::default()).await;
        driver.set("k", &json!("a long first value"), None).await.unwrap();
        driver.set("k", &json!("b"), None).await.unwrap();
        assert_eq!(driver.get("k").await.unwrap(), Some(json!("b")));
    }

    #[tokio::test]
    async fn test_expiration_is_lazy_and_deletes_record() {
        let (dir, driver, clock) = make_driver(CacheConfig::default()).await;
        driver.set("k", &json!("v"), Some(1)).await.unwrap();
        assert_eq!(driver.get("k").await.unwrap(), Some(json!("v")));
        assert!(driver.has("k").await.unwrap());

        clock.advance(Duration::from_secs(5));
        let file = dir.path().join(driver.cache_key("k"));
        assert!(file.exists(), "expired record is only removed on access");

        assert_eq!(driver.get("k").await.unwrap(), None);
        assert!(!driver.has("k").await.unwrap());
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_zero_expire_never_expires() {
        let (_dir, driver, clock) = make_driver(CacheConfig {
            expire: 10,
            ..CacheConfig::default()
        })
        .await;
        driver.set("forever", &json!(1), Some(0)).await.unwrap();
        driver.set("default", &json!(2), None).await.unwrap();

        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert_eq!(driver.get("forever").await.unwrap(), Some(json!(1)));
        assert_eq!(driver.get("default").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_compressed_roundtrip() {
        let (dir, driver, _clock) = make_driver(CacheConfig {
            data_compress: true,
            cache_subdir: false,
            ..CacheConfig::default()
        })
        .await;
        let value = json!({"body": "z".repeat(500)});
        driver.set("big", &value, None).await.unwrap();
        assert_eq!(driver.get("big").await.unwrap(), Some(value));

        let raw = std::fs::read(dir.path().join(driver.cache_key("big"))).unwrap();
        assert!(raw.len() < 200);
    }

    #[tokio::test]
    async fn test_corrupt_record_reads_as_absent() {
        let (dir, driver, _clock) = make_driver(CacheConfig::default()).await;
        driver.set("k", &json!({"a": 1}), None).await.unwrap();
        let file = dir.path().join(driver.cache_key("k"));
        let raw = std::fs::read(&file).unwrap();
        std::fs::write(&file, &raw[..raw.len() / 2]).unwrap();

        assert_eq!(driver.get("k").await.unwrap(), None);
        assert_eq!(
            driver.get_or("k", json!("dflt")).await.unwrap(),
            json!("dflt")
        );
        assert!(!driver.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_dir, driver, _clock) = make_driver(CacheConfig::default()).await;
        assert!(driver.remove("never-set").await.unwrap());
        driver.set("k", &json!(1), None).await.unwrap();
        assert!(driver.remove("k").await.unwrap());
        assert!(driver.remove("k").await.unwrap());
        assert_eq!(driver.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_inc_dec_on_absent_keys() {
        let (_dir, driver, _clock) = make_driver(CacheConfig::default()).await;
        assert_eq!(driver.inc("counter", 1).await.unwrap(), 1);
        assert_eq!(driver.inc("counter", 5).await.unwrap(), 6);
        assert_eq!(driver.dec("counter2", 1).await.unwrap(), -1);
        assert_eq!(driver.get("counter").await.unwrap(), Some(json!(6)));
    }

    #[tokio::test]
    async fn test_inc_resets_custom_ttl_to_default() {
        let (_dir, driver, clock) = make_driver(CacheConfig::default()).await;
        driver.set("hits", &json!(1), Some(2)).await.unwrap();
        assert_eq!(driver.inc("hits", 1).await.unwrap(), 2);

        // The 2 second TTL is gone: the default (never) applies after inc.
        clock.advance(Duration::from_secs(60));
        assert_eq!(driver.get("hits").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_inc_on_non_integer_fails() {
        let (_dir, driver, _clock) = make_driver(CacheConfig::default()).await;
        driver.set("name", &json!("alice"), None).await.unwrap();
        let err = driver.inc("name", 1).await.unwrap_err();
        assert_eq!(err.kind, kvstash_core::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_pull_truthiness() {
        let (_dir, driver, _clock) = make_driver(CacheConfig::default()).await;
        driver.set("token", &json!("abc"), None).await.unwrap();
        driver.set("zero", &json!(0), None).await.unwrap();

        assert_eq!(driver.pull("token").await.unwrap(), Some(json!("abc")));
        assert!(!driver.has("token").await.unwrap());

        // Falsy values are not pulled and stay in place.
        assert_eq!(driver.pull("zero").await.unwrap(), None);
        assert!(driver.has("zero").await.unwrap());

        assert_eq!(driver.pull_strict("zero").await.unwrap(), Some(json!(0)));
        assert!(!driver.has("zero").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_scoped_to_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        let scoped = FileDriver::new(&CacheConfig {
            prefix: "scoped".into(),
            ..CacheConfig::file(root.clone())
        })
        .await
        .unwrap();
        let other = FileDriver::new(&CacheConfig::file(root)).await.unwrap();

        scoped.set("a", &json!(1), None).await.unwrap();
        scoped.set("b", &json!(2), None).await.unwrap();
        other.set("c", &json!(3), None).await.unwrap();

        assert!(scoped.clear().await.unwrap());
        assert_eq!(scoped.get("a").await.unwrap(), None);
        assert_eq!(scoped.get("b").await.unwrap(), None);
        assert_eq!(other.get("c").await.unwrap(), Some(json!(3)));

        // Nothing left under the prefix, and clearing again is fine.
        assert!(std::fs::read_dir(dir.path().join("scoped")).unwrap().next().is_none());
        assert!(scoped.clear().await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_empty_root() {
        let (_dir, driver, _clock) = make_driver(CacheConfig::default()).await;
        assert!(driver.clear().await.unwrap());
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Profile {
            name: String,
            age: u32,
        }

        let (_dir, driver, _clock) = make_driver(CacheConfig::default()).await;
        let profile = Profile {
            name: "ann".into(),
            age: 31,
        };
        assert!(driver.set_json("p", &profile, None).await.unwrap());
        let back: Option<Profile> = driver.get_json("p").await.unwrap();
        assert_eq!(back, Some(profile));
    }
}
