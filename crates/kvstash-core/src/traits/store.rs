//! Remote key/value store client trait.
//!
//! The subset of Redis string commands the cache layer relies on. Keys are
//! passed through verbatim; namespacing is the caller's job.

use async_trait::async_trait;

use crate::result::AppResult;

/// Primitive key/value commands with native TTL and atomic counters.
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the store type name (e.g., "redis", "memory").
    fn store_type(&self) -> &str;

    /// `GET key`. `None` when the key is absent.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// `SET key value` with no TTL.
    async fn set(&self, key: &str, value: &str) -> AppResult<bool>;

    /// `SETEX key ttl value`. `ttl_seconds` must be non-zero.
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<bool>;

    /// `EXISTS key`.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// `DEL key`. Returns the number of keys removed.
    async fn del(&self, key: &str) -> AppResult<u64>;

    /// `INCRBY key step`. Missing keys start at 0.
    async fn incr_by(&self, key: &str, step: i64) -> AppResult<i64>;

    /// `DECRBY key step`. Missing keys start at 0.
    async fn decr_by(&self, key: &str, step: i64) -> AppResult<i64>;

    /// `TTL key` in seconds; `None` when the key is absent or has no TTL.
    async fn ttl(&self, key: &str) -> AppResult<Option<u64>>;

    /// `FLUSHDB`: empties the whole selected database.
    async fn flush_db(&self) -> AppResult<bool>;

    /// `PING`.
    async fn ping(&self) -> AppResult<bool>;
}
