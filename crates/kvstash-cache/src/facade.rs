//! The cache facade.

use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use kvstash_core::config::cache::{CacheConfig, DriverKind};
use kvstash_core::error::AppError;
use kvstash_core::result::AppResult;
use kvstash_core::traits::cache::CacheDriver;

use crate::backend::{CacheBackend, Handler};
use crate::keys;
use crate::tag::{self, TagKeys};

/// Entry point to the cache.
///
/// Builds the configured driver on first use and forwards every call to
/// it. Also keeps tag records: named member lists used to invalidate
/// groups of entries together.
#[derive(Debug)]
pub struct Cache {
    /// Driver options.
    config: CacheConfig,
    /// Backend selected when the facade was created.
    kind: DriverKind,
    /// The driver, built on first use.
    driver: OnceCell<CacheBackend>,
    /// Tag the next `set` is recorded under.
    pending_tag: Mutex<Option<String>>,
}

impl Cache {
    /// Create a facade. The configuration is validated now; the driver is
    /// built on first use.
    pub fn new(config: CacheConfig) -> AppResult<Self> {
        let kind = config.validate()?;
        Ok(Self {
            config,
            kind,
            driver: OnceCell::new(),
            pending_tag: Mutex::new(None),
        })
    }

    /// Create a facade around an already built backend.
    pub fn from_backend(config: CacheConfig, backend: CacheBackend) -> Self {
        Self {
            config,
            kind: backend.kind(),
            driver: OnceCell::from(backend),
            pending_tag: Mutex::new(None),
        }
    }

    /// The driver options.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The selected backend.
    pub fn kind(&self) -> DriverKind {
        self.kind
    }

    /// Whether the driver has been built.
    pub fn is_connected(&self) -> bool {
        self.driver.initialized()
    }

    /// The driver, building it if this is the first call.
    pub async fn connect(&self) -> AppResult<&CacheBackend> {
        self.driver
            .get_or_try_init(|| async {
                info!(kind = %self.kind, "Connecting cache driver");
                CacheBackend::connect(&self.config).await
            })
            .await
    }

    /// Drop the driver and any pending tag. The next call builds a new driver.
    pub fn reset(&mut self) {
        if self.driver.take().is_some() {
            debug!(kind = %self.kind, "Cache driver reset");
        }
        *self.pending_tag.get_mut() = None;
    }

    /// The backend's underlying collaborator.
    pub async fn handler(&self) -> AppResult<Handler<'_>> {
        Ok(self.connect().await?.handler())
    }

    /// Get a live value.
    pub async fn get(&self, name: &str) -> AppResult<Option<Value>> {
        self.connect().await?.get(name).await
    }

    /// Get a live value or `default`.
    pub async fn get_or(&self, name: &str, default: Value) -> AppResult<Value> {
        self.connect().await?.get_or(name, default).await
    }

    /// Get a typed value.
    pub async fn get_json<T>(&self, name: &str) -> AppResult<Option<T>>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.connect().await?.get_json(name).await
    }

    /// Store a value.
    ///
    /// If [`tag`](Self::tag) was called without keys, the entry is added
    /// to that tag. The pending tag is consumed by this call either way.
    pub async fn set(&self, name: &str, value: &Value, expire: Option<u64>) -> AppResult<bool> {
        let driver = self.connect().await?;
        let pending = self.pending_tag.lock().await.take();

        let stored = driver.set(name, value, expire).await?;
        if let Some(tag_name) = pending {
            if stored {
                let member = driver.cache_key(name);
                self.write_members(driver, &tag_name, vec![member], false)
                    .await?;
            } else {
                debug!(tag = %tag_name, "Value not stored, tag membership skipped");
            }
        }
        Ok(stored)
    }

    /// Store a typed value.
    pub async fn set_json<T>(&self, name: &str, value: &T, expire: Option<u64>) -> AppResult<bool>
    where
        T: serde::Serialize + Send + Sync,
    {
        let value = serde_json::to_value(value)?;
        self.set(name, &value, expire).await
    }

    /// Increment a counter.
    pub async fn inc(&self, name: &str, step: i64) -> AppResult<i64> {
        self.connect().await?.inc(name, step).await
    }

    /// Decrement a counter.
    pub async fn dec(&self, name: &str, step: i64) -> AppResult<i64> {
        self.connect().await?.dec(name, step).await
    }

    /// Whether a live value exists.
    pub async fn has(&self, name: &str) -> AppResult<bool> {
        self.connect().await?.has(name).await
    }

    /// Delete a value.
    pub async fn remove(&self, name: &str) -> AppResult<bool> {
        self.connect().await?.remove(name).await
    }

    /// Delete everything in the driver's scope.
    pub async fn clear(&self) -> AppResult<bool> {
        self.connect().await?.clear().await
    }

    /// Read and delete a truthy value.
    pub async fn pull(&self, name: &str) -> AppResult<Option<Value>> {
        self.connect().await?.pull(name).await
    }

    /// Read and delete any value.
    pub async fn pull_strict(&self, name: &str) -> AppResult<Option<Value>> {
        self.connect().await?.pull_strict(name).await
    }

    /// Check the backend.
    pub async fn ping(&self) -> AppResult<bool> {
        self.connect().await?.ping().await
    }

    /// Tag cache entries.
    ///
    /// With `keys == None` the next [`set`](Self::set) on this facade is
    /// recorded under `name`. Otherwise the keys' mapped identifiers are
    /// merged into the tag's members, or replace them when `overlay` is
    /// set. Returns the facade for chaining.
    pub async fn tag(
        &self,
        name: &str,
        keys: Option<TagKeys>,
        overlay: bool,
    ) -> AppResult<&Self> {
        if name.is_empty() {
            return Err(AppError::validation("required tag name"));
        }

        match keys {
            None => {
                *self.pending_tag.lock().await = Some(name.to_string());
                debug!(tag = %name, "Pending tag set");
            }
            Some(keys) => {
                let driver = self.connect().await?;
                let members = keys
                    .names()
                    .iter()
                    .map(|key| driver.cache_key(key))
                    .collect();
                self.write_members(driver, name, members, overlay).await?;
            }
        }
        Ok(self)
    }

    /// Mapped identifiers recorded under a tag.
    pub async fn tag_items(&self, name: &str) -> AppResult<Vec<String>> {
        let driver = self.connect().await?;
        Self::read_members(driver, name).await
    }

    /// Delete every member of a tag and the tag record. Returns how many
    /// live members were deleted.
    pub async fn clear_tag(&self, name: &str) -> AppResult<usize> {
        let driver = self.connect().await?;
        let members = Self::read_members(driver, name).await?;

        let mut removed = 0;
        for member in &members {
            if driver.has_key(member).await? {
                removed += 1;
            }
            if !driver.remove_key(member).await? {
                warn!(tag = %name, member = %member, "Failed to remove tagged entry");
            }
        }
        driver.remove(&keys::tag_record_name(name)).await?;
        info!(tag = %name, removed, "Cleared tag");
        Ok(removed)
    }

    /// Drop members whose entries no longer exist. Returns how many were
    /// dropped.
    pub async fn prune_tag(&self, name: &str) -> AppResult<usize> {
        let driver = self.connect().await?;
        let members = Self::read_members(driver, name).await?;

        let mut live = Vec::with_capacity(members.len());
        for member in &members {
            if driver.has_key(member).await? {
                live.push(member.clone());
            }
        }

        let pruned = members.len() - live.len();
        if pruned > 0 {
            self.write_members(driver, name, live, true).await?;
        }
        debug!(tag = %name, pruned, "Pruned tag");
        Ok(pruned)
    }

    async fn read_members(driver: &CacheBackend, name: &str) -> AppResult<Vec<String>> {
        let record = driver.get(&keys::tag_record_name(name)).await?;
        Ok(match record {
            Some(Value::String(raw)) => tag::parse_members(&raw),
            _ => Vec::new(),
        })
    }

    async fn write_members(
        &self,
        driver: &CacheBackend,
        name: &str,
        members: Vec<String>,
        overlay: bool,
    ) -> AppResult<()> {
        let members = if overlay {
            tag::dedup_members(members)
        } else {
            let existing = Self::read_members(driver, name).await?;
            tag::merge_members(existing, members)
        };

        // Tag records never expire.
        let record = Value::String(tag::join_members(&members));
        if !driver
            .set(&keys::tag_record_name(name), &record, Some(0))
            .await?
        {
            return Err(AppError::storage(format!("Failed to persist tag '{name}'")));
        }
        debug!(tag = %name, members = members.len(), "Tag record written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::file::FileDriver;
    use kvstash_core::clock::ManualClock;
    use kvstash_core::error::ErrorKind;
    use serde_json::json;

    fn file_cache(dir: &tempfile::TempDir) -> Cache {
        Cache::new(CacheConfig::file(dir.path().to_str().unwrap())).unwrap()
    }

    #[tokio::test]
    async fn test_connect_is_lazy_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = file_cache(&dir);
        assert!(!cache.is_connected());

        let first = cache.connect().await.unwrap() as *const CacheBackend;
        let second = cache.connect().await.unwrap() as *const CacheBackend;
        assert_eq!(first, second);
        assert!(cache.is_connected());
    }

    #[tokio::test]
    async fn test_reset_rebuilds_driver() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = file_cache(&dir);
        cache.set("k", &json!(1), None).await.unwrap();
        cache.reset();
        assert!(!cache.is_connected());
        assert_eq!(cache.get("k").await.unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let err = Cache::new(CacheConfig::file("")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);

        let config = CacheConfig {
            kind: "apcu".into(),
            ..CacheConfig::default()
        };
        assert_eq!(Cache::new(config).unwrap_err().kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_tag_merge_and_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let cache = file_cache(&dir);
        let backend = cache.connect().await.unwrap();
        let id = |name: &str| backend.cache_key(name);

        cache.tag("t", Some(["a", "b"].into()), false).await.unwrap();
        assert_eq!(cache.tag_items("t").await.unwrap(), vec![id("a"), id("b")]);

        cache.tag("t", Some(["b", "c"].into()), false).await.unwrap();
        assert_eq!(
            cache.tag_items("t").await.unwrap(),
            vec![id("a"), id("b"), id("c")]
        );

        cache.tag("t", Some("b,c".into()), true).await.unwrap();
        assert_eq!(cache.tag_items("t").await.unwrap(), vec![id("b"), id("c")]);
    }

    #[tokio::test]
    async fn test_pending_tag_is_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let cache = file_cache(&dir);

        cache
            .tag("news", None, false)
            .await
            .unwrap()
            .set("first", &json!("x"), None)
            .await
            .unwrap();
        cache.set("second", &json!("y"), None).await.unwrap();

        let backend = cache.connect().await.unwrap();
        assert_eq!(
            cache.tag_items("news").await.unwrap(),
            vec![backend.cache_key("first")]
        );
    }

    #[tokio::test]
    async fn test_empty_tag_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = file_cache(&dir);
        let err = cache.tag("", None, false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_tag_record_survives_default_expire() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::starting_now();
        let config = CacheConfig {
            expire: 10,
            ..CacheConfig::file(dir.path().to_str().unwrap())
        };
        let driver = FileDriver::new(&config)
            .await
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        let cache = Cache::from_backend(config, CacheBackend::File(driver));

        cache.tag("t", Some("a".into()), false).await.unwrap();
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.tag_items("t").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_tag_and_prune() {
        let dir = tempfile::tempdir().unwrap();
        let cache = file_cache(&dir);
        for name in ["a", "b", "c"] {
            cache.set(name, &json!(name), None).await.unwrap();
        }
        cache.tag("t", Some(["a", "b", "c"].into()), false).await.unwrap();

        cache.remove("b").await.unwrap();
        assert_eq!(cache.prune_tag("t").await.unwrap(), 1);
        assert_eq!(cache.tag_items("t").await.unwrap().len(), 2);
        assert_eq!(cache.prune_tag("t").await.unwrap(), 0);

        assert_eq!(cache.clear_tag("t").await.unwrap(), 2);
        assert!(!cache.has("a").await.unwrap());
        assert!(!cache.has("c").await.unwrap());
        assert!(cache.tag_items("t").await.unwrap().is_empty());
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_memory_backend_through_facade() {
        let cache = Cache::new(CacheConfig::memory()).unwrap();
        assert_eq!(cache.kind(), DriverKind::Memory);
        assert_eq!(cache.inc("n", 1).await.unwrap(), 1);
        assert_eq!(cache.dec("n", 3).await.unwrap(), -2);
        assert!(cache.ping().await.unwrap());
        assert!(matches!(cache.handler().await.unwrap(), Handler::Store(_)));
    }
}
