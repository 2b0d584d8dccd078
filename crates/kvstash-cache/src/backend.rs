//! The closed set of cache backends.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use kvstash_core::config::cache::{CacheConfig, DriverKind};
use kvstash_core::result::AppResult;
use kvstash_core::traits::cache::CacheDriver;
use kvstash_core::traits::storage::FileStore;
use kvstash_core::traits::store::KeyValueStore;

use crate::file::FileDriver;
use crate::redis::RedisDriver;

/// A constructed cache driver.
#[derive(Debug, Clone)]
pub enum CacheBackend {
    /// Records on the local file system.
    File(FileDriver),
    /// A Redis-style key/value store (remote or in-process).
    Redis(RedisDriver),
}

/// The collaborator a backend is built on, for operations the cache
/// contract does not cover.
#[derive(Debug, Clone, Copy)]
pub enum Handler<'a> {
    /// File-system helper of the file backend.
    File(&'a Arc<dyn FileStore>),
    /// Store client of the redis backend.
    Store(&'a Arc<dyn KeyValueStore>),
}

impl CacheBackend {
    /// Build the backend selected by `config`.
    pub async fn connect(config: &CacheConfig) -> AppResult<Self> {
        let kind = config.validate()?;
        info!(kind = %kind, "Initializing cache driver");
        match kind {
            DriverKind::File => Ok(Self::File(FileDriver::new(config).await?)),
            #[cfg(feature = "redis-backend")]
            DriverKind::Redis => Ok(Self::Redis(RedisDriver::connect(config).await?)),
            #[cfg(feature = "memory")]
            DriverKind::Memory => {
                let store = crate::memory::MemoryStore::new();
                Ok(Self::Redis(RedisDriver::with_store(Arc::new(store), config)))
            }
            #[allow(unreachable_patterns)]
            other => Err(kvstash_core::error::AppError::configuration(format!(
                "Cache type '{other}' is not enabled in this build"
            ))),
        }
    }

    /// The underlying collaborator.
    pub fn handler(&self) -> Handler<'_> {
        match self {
            Self::File(driver) => Handler::File(driver.handler()),
            Self::Redis(driver) => Handler::Store(driver.handler()),
        }
    }

    fn driver(&self) -> &dyn CacheDriver {
        match self {
            Self::File(driver) => driver,
            Self::Redis(driver) => driver,
        }
    }
}

#[async_trait]
impl CacheDriver for CacheBackend {
    fn kind(&self) -> DriverKind {
        self.driver().kind()
    }

    fn cache_key(&self, name: &str) -> String {
        self.driver().cache_key(name)
    }

    async fn get(&self, name: &str) -> AppResult<Option<Value>> {
        self.driver().get(name).await
    }

    async fn set(&self, name: &str, value: &Value, expire: Option<u64>) -> AppResult<bool> {
        self.driver().set(name, value, expire).await
    }

    async fn inc(&self, name: &str, step: i64) -> AppResult<i64> {
        self.driver().inc(name, step).await
    }

    async fn dec(&self, name: &str, step: i64) -> AppResult<i64> {
        self.driver().dec(name, step).await
    }

    async fn has(&self, name: &str) -> AppResult<bool> {
        self.driver().has(name).await
    }

    async fn remove(&self, name: &str) -> AppResult<bool> {
        self.driver().remove(name).await
    }

    async fn clear(&self) -> AppResult<bool> {
        self.driver().clear().await
    }

    async fn has_key(&self, key: &str) -> AppResult<bool> {
        self.driver().has_key(key).await
    }

    async fn remove_key(&self, key: &str) -> AppResult<bool> {
        self.driver().remove_key(key).await
    }

    async fn ping(&self) -> AppResult<bool> {
        self.driver().ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvstash_core::error::ErrorKind;

    #[tokio::test]
    async fn test_file_backend_selected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = CacheBackend::connect(&CacheConfig::file(dir.path().to_str().unwrap()))
            .await
            .unwrap();
        assert_eq!(backend.kind(), DriverKind::File);
        assert!(matches!(backend.handler(), Handler::File(_)));
        assert!(backend.ping().await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_backend_runs_redis_driver() {
        let backend = CacheBackend::connect(&CacheConfig::memory()).await.unwrap();
        assert_eq!(backend.kind(), DriverKind::Redis);
        match backend.handler() {
            Handler::Store(store) => assert_eq!(store.store_type(), "memory"),
            Handler::File(_) => panic!("expected a key/value store"),
        }
    }

    #[tokio::test]
    async fn test_unknown_type_fails() {
        let config = CacheConfig {
            kind: "memcache".into(),
            ..CacheConfig::default()
        };
        let err = CacheBackend::connect(&config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
