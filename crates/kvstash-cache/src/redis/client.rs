//! Redis connection management.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult};
use tracing::info;

use kvstash_core::config::cache::CacheConfig;
use kvstash_core::error::{AppError, ErrorKind};
use kvstash_core::result::AppResult;
use kvstash_core::traits::store::KeyValueStore;

/// Redis client wrapper with connection management.
///
/// Keys are sent verbatim; the cache driver applies its own prefix.
#[derive(Clone)]
pub struct RedisClient {
    /// Redis connection manager (reconnecting).
    conn: ConnectionManager,
    /// Per-command timeout, if configured.
    timeout: Option<Duration>,
    /// Masked URL, for logs and `Debug`.
    display_url: String,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("url", &self.display_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisClient {
    /// Connect using the host, port, password, select and timeout options.
    pub async fn connect(config: &CacheConfig) -> AppResult<Self> {
        let url = config.redis_url();
        let display_url = config.redis_display_url();
        let timeout = (config.timeout > 0).then(|| Duration::from_secs(config.timeout));
        info!(url = %display_url, "Connecting to Redis");

        let client = Client::open(url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Cache, "Failed to create Redis client", e)
        })?;

        let connecting = ConnectionManager::new(client);
        let conn = match timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| AppError::cache(format!("Timed out connecting to {display_url}")))?,
            None => connecting.await,
        }
        .map_err(|e| AppError::with_source(ErrorKind::Cache, "Failed to connect to Redis", e))?;

        info!(url = %display_url, "Successfully connected to Redis");
        Ok(Self {
            conn,
            timeout,
            display_url,
        })
    }

    /// Get a mutable clone of the connection manager.
    pub fn conn_mut(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Await a command, applying the configured timeout.
    async fn run<T, F>(&self, command: &'static str, fut: F) -> AppResult<T>
    where
        F: Future<Output = RedisResult<T>> + Send,
    {
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                AppError::cache(format!(
                    "Redis {command} timed out after {}s",
                    limit.as_secs()
                ))
            })?,
            None => fut.await,
        };
        result.map_err(Self::map_err)
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Cache, format!("Redis error: {e}"), e)
    }
}

#[async_trait]
impl KeyValueStore for RedisClient {
    fn store_type(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn_mut();
        self.run("GET", conn.get(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<bool> {
        let mut conn = self.conn_mut();
        let _: () = self.run("SET", conn.set(key, value)).await?;
        Ok(true)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<bool> {
        let mut conn = self.conn_mut();
        let _: () = self
            .run("SETEX", conn.set_ex(key, value, ttl_seconds))
            .await?;
        Ok(true)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn_mut();
        self.run("EXISTS", conn.exists(key)).await
    }

    async fn del(&self, key: &str) -> AppResult<u64> {
        let mut conn = self.conn_mut();
        self.run("DEL", conn.del(key)).await
    }

    async fn incr_by(&self, key: &str, step: i64) -> AppResult<i64> {
        let mut conn = self.conn_mut();
        self.run("INCRBY", conn.incr(key, step)).await
    }

    async fn decr_by(&self, key: &str, step: i64) -> AppResult<i64> {
        let mut conn = self.conn_mut();
        self.run("DECRBY", conn.decr(key, step)).await
    }

    async fn ttl(&self, key: &str) -> AppResult<Option<u64>> {
        let mut conn = self.conn_mut();
        let ttl: i64 = self.run("TTL", conn.ttl(key)).await?;
        // -2: no such key, -1: no expiry.
        Ok(u64::try_from(ttl).ok())
    }

    async fn flush_db(&self) -> AppResult<bool> {
        let mut conn = self.conn_mut();
        let _: () = self
            .run("FLUSHDB", redis::cmd("FLUSHDB").query_async(&mut conn))
            .await?;
        Ok(true)
    }

    async fn ping(&self) -> AppResult<bool> {
        let mut conn = self.conn_mut();
        let pong: String = self
            .run("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use redis::IntoConnectionInfo;

    use super::*;

    #[test]
    fn test_url_with_reserved_password_chars_parses() {
        let config = CacheConfig {
            password: "p@ss/w#rd".into(),
            select: 3,
            ..CacheConfig::redis("cache.local", 6379)
        };
        let url = config.redis_url();
        assert!(url.as_str().into_connection_info().is_ok());
        assert!(Client::open(url.as_str()).is_ok());
    }

    #[test]
    fn test_plain_url_parses() {
        let url = CacheConfig::redis("127.0.0.1", 6379).redis_url();
        assert!(url.as_str().into_connection_info().is_ok());
    }
}
