//! Cache driver over a Redis-style key/value store.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use kvstash_core::config::cache::{CacheConfig, DriverKind};
use kvstash_core::result::AppResult;
use kvstash_core::traits::cache::CacheDriver;
use kvstash_core::traits::store::KeyValueStore;

use crate::keys;

/// Cache driver that delegates storage, expiry and counters to a
/// [`KeyValueStore`].
///
/// Values are stored as JSON strings under `prefix + name`. Expiry is the
/// store's native TTL; counters use its atomic INCRBY/DECRBY.
#[derive(Debug, Clone)]
pub struct RedisDriver {
    /// The store client.
    store: Arc<dyn KeyValueStore>,
    /// Namespace prepended to every key.
    prefix: String,
    /// Default TTL in seconds.
    default_expire: u64,
}

impl RedisDriver {
    /// Connect to the Redis server described by `config`.
    #[cfg(feature = "redis-backend")]
    pub async fn connect(config: &CacheConfig) -> AppResult<Self> {
        let client = super::client::RedisClient::connect(config).await?;
        Ok(Self::with_store(Arc::new(client), config))
    }

    /// Create a driver over an existing store client.
    pub fn with_store(store: Arc<dyn KeyValueStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            prefix: config.prefix.clone(),
            default_expire: config.expire,
        }
    }

    /// The underlying store client.
    pub fn handler(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }
}

#[async_trait]
impl CacheDriver for RedisDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Redis
    }

    fn cache_key(&self, name: &str) -> String {
        keys::namespaced_key(&self.prefix, name)
    }

    async fn get(&self, name: &str) -> AppResult<Option<Value>> {
        let key = self.cache_key(name);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(key = %key, error = %e, "Ignoring undecodable cache value");
                Ok(None)
            }
        }
    }

    async fn set(&self, name: &str, value: &Value, expire: Option<u64>) -> AppResult<bool> {
        let expire = expire.unwrap_or(self.default_expire);
        let key = self.cache_key(name);
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache value");
                return Ok(false);
            }
        };

        // A zero expire means "no TTL", never SETEX 0.
        if expire > 0 {
            self.store.set_ex(&key, &raw, expire).await
        } else {
            self.store.set(&key, &raw).await
        }
    }

    async fn inc(&self, name: &str, step: i64) -> AppResult<i64> {
        self.store.incr_by(&self.cache_key(name), step).await
    }

    async fn dec(&self, name: &str, step: i64) -> AppResult<i64> {
        self.store.decr_by(&self.cache_key(name), step).await
    }

    async fn has(&self, name: &str) -> AppResult<bool> {
        self.has_key(&self.cache_key(name)).await
    }

    /// Returns `true` once `DEL` succeeds, whether or not the key existed.
    /// Removing an absent entry is not a failure; only store errors are.
    async fn remove(&self, name: &str) -> AppResult<bool> {
        self.remove_key(&self.cache_key(name)).await
    }

    /// Flushes the whole selected database, not just `prefix`.
    async fn clear(&self) -> AppResult<bool> {
        warn!(
            prefix = %self.prefix,
            "Flushing the entire selected database; clear is not scoped to the prefix"
        );
        self.store.flush_db().await
    }

    async fn has_key(&self, key: &str) -> AppResult<bool> {
        self.store.exists(key).await
    }

    /// Same contract as [`remove`](Self::remove): the `DEL` count is only logged.
    async fn remove_key(&self, key: &str) -> AppResult<bool> {
        let removed = self.store.del(key).await?;
        debug!(key, removed, "Deleted cache key");
        Ok(true)
    }

    async fn ping(&self) -> AppResult<bool> {
        self.store.ping().await
    }
}
