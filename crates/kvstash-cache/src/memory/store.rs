//! In-memory key/value store using dashmap.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use kvstash_core::clock::{Clock, SystemClock};
use kvstash_core::error::AppError;
use kvstash_core::result::AppResult;
use kvstash_core::traits::store::KeyValueStore;

/// A stored string and its optional deadline.
#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl MemoryEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// In-process store with per-key TTL and atomic counters.
///
/// Expired keys are dropped lazily when touched. Each command holds the
/// key's shard lock, so INCRBY/DECRBY are atomic within the process.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    /// Entries by key.
    entries: Arc<DashMap<String, MemoryEntry>>,
    /// Clock used for TTL bookkeeping.
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for TTL bookkeeping.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of keys held, including expired keys not yet dropped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&self, key: &str, value: &str, ttl_seconds: Option<u64>) {
        let expires_at = ttl_seconds.map(|secs| {
            let ttl = i64::try_from(secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .unwrap_or(chrono::Duration::MAX);
            self.clock
                .now()
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    fn add(&self, key: &str, delta: i64) -> AppResult<i64> {
        let now = self.clock.now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| MemoryEntry {
                value: "0".to_string(),
                expires_at: None,
            });
        if !entry.is_live(now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }

        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| AppError::cache("ERR value is not an integer or out of range"))?;
        let next = current
            .checked_add(delta)
            .ok_or_else(|| AppError::cache("ERR increment or decrement would overflow"))?;
        // The existing TTL is kept, as INCRBY does.
        entry.value = next.to_string();
        Ok(next)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn store_type(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
            debug!(key, "Dropped expired key");
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<bool> {
        self.insert(key, value, None);
        Ok(true)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<bool> {
        if ttl_seconds == 0 {
            return Err(AppError::cache("ERR invalid expire time in 'setex' command"));
        }
        self.insert(key, value, Some(ttl_seconds));
        Ok(true)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn del(&self, key: &str) -> AppResult<u64> {
        let now = self.clock.now();
        match self.entries.remove(key) {
            Some((_, entry)) if entry.is_live(now) => Ok(1),
            _ => Ok(0),
        }
    }

    async fn incr_by(&self, key: &str, step: i64) -> AppResult<i64> {
        self.add(key, step)
    }

    async fn decr_by(&self, key: &str, step: i64) -> AppResult<i64> {
        let delta = step
            .checked_neg()
            .ok_or_else(|| AppError::cache("ERR decrement would overflow"))?;
        self.add(key, delta)
    }

    async fn ttl(&self, key: &str) -> AppResult<Option<u64>> {
        let now = self.clock.now();
        Ok(self.entries.get(key).and_then(|entry| {
            if !entry.is_live(now) {
                return None;
            }
            entry
                .expires_at
                .map(|deadline| u64::try_from((deadline - now).num_seconds()).unwrap_or(0))
        }))
    }

    async fn flush_db(&self) -> AppResult<bool> {
        self.entries.clear();
        Ok(true)
    }

    async fn ping(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use kvstash_core::clock::ManualClock;

    fn make_store() -> (MemoryStore, ManualClock) {
        let clock = ManualClock::starting_now();
        let store = MemoryStore::new().with_clock(Arc::new(clock.clone()));
        (store, clock)
    }

    #[tokio::test]
    async fn test_set_get() {
        let (store, _clock) = make_store();
        store.set("key1", "value1").await.unwrap();
        assert_eq!(store.get("key1").await.unwrap(), Some("value1".to_string()));
        assert_eq!(store.ttl("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_ex_expires() {
        let (store, clock) = make_store();
        store.set_ex("k", "v", 5).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), Some(5));
        assert!(store.exists("k").await.unwrap());

        clock.advance(Duration::from_secs(5));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_set_ex_rejects_zero() {
        let (store, _clock) = make_store();
        assert!(store.set_ex("k", "v", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_del_counts() {
        let (store, _clock) = make_store();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.del("k").await.unwrap(), 1);
        assert_eq!(store.del("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_incr_decr() {
        let (store, _clock) = make_store();
        assert_eq!(store.incr_by("counter", 1).await.unwrap(), 1);
        assert_eq!(store.incr_by("counter", 1).await.unwrap(), 2);
        assert_eq!(store.decr_by("counter", 1).await.unwrap(), 1);
        assert_eq!(store.decr_by("other", 3).await.unwrap(), -3);
        assert_eq!(store.get("counter").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_incr_keeps_ttl_and_rejects_text() {
        let (store, _clock) = make_store();
        store.set_ex("hits", "10", 30).await.unwrap();
        assert_eq!(store.incr_by("hits", 5).await.unwrap(), 15);
        assert_eq!(store.ttl("hits").await.unwrap(), Some(30));

        store.set("name", "\"alice\"").await.unwrap();
        assert!(store.incr_by("name", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_flush_db() {
        let (store, _clock) = make_store();
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.flush_db().await.unwrap());
        assert!(store.is_empty());
        assert!(store.ping().await.unwrap());
    }
}
