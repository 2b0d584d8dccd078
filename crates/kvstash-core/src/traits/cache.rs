//! Cache driver trait implemented by every backend.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::cache::DriverKind;
use crate::result::AppResult;
use crate::value::is_truthy;

/// The capability set every cache backend provides.
///
/// Values are JSON documents. A missing, expired or unreadable entry is
/// `Ok(None)`, never an error. `expire` is in seconds: `None` applies the
/// backend's configured default, `Some(0)` stores the entry without expiry.
#[async_trait]
pub trait CacheDriver: Send + Sync + std::fmt::Debug + 'static {
    /// Which backend this is.
    fn kind(&self) -> DriverKind;

    /// The backend-specific identifier for a cache name: a relative file
    /// path for the file backend, the namespaced key for the remote one.
    fn cache_key(&self, name: &str) -> String;

    /// Get a live value.
    async fn get(&self, name: &str) -> AppResult<Option<Value>>;

    /// Store a value, replacing any existing one. `Ok(false)` on a soft
    /// persistence failure.
    async fn set(&self, name: &str, value: &Value, expire: Option<u64>) -> AppResult<bool>;

    /// Add `step` to an integer entry and return the new value.
    async fn inc(&self, name: &str, step: i64) -> AppResult<i64>;

    /// Subtract `step` from an integer entry and return the new value.
    async fn dec(&self, name: &str, step: i64) -> AppResult<i64>;

    /// Whether a live value exists.
    async fn has(&self, name: &str) -> AppResult<bool>;

    /// Delete an entry. Deleting a missing entry succeeds.
    async fn remove(&self, name: &str) -> AppResult<bool>;

    /// Delete every entry in the backend's scope.
    async fn clear(&self) -> AppResult<bool>;

    /// Whether a live entry exists for an identifier from [`cache_key`](Self::cache_key).
    async fn has_key(&self, key: &str) -> AppResult<bool>;

    /// Delete the entry for an identifier from [`cache_key`](Self::cache_key).
    async fn remove_key(&self, key: &str) -> AppResult<bool>;

    /// Check that the backend is usable.
    async fn ping(&self) -> AppResult<bool>;

    /// Get a live value or the supplied default.
    async fn get_or(&self, name: &str, default: Value) -> AppResult<Value> {
        Ok(self.get(name).await?.unwrap_or(default))
    }

    /// Read and delete a value.
    ///
    /// Only truthy values count as found: a stored `0`, `""` or `false`
    /// yields `None` and is left in place. See [`pull_strict`](Self::pull_strict).
    async fn pull(&self, name: &str) -> AppResult<Option<Value>> {
        match self.get(name).await? {
            Some(value) if is_truthy(&value) => {
                self.remove(name).await?;
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    /// Read and delete a value, whatever it is.
    async fn pull_strict(&self, name: &str) -> AppResult<Option<Value>> {
        match self.get(name).await? {
            Some(value) => {
                self.remove(name).await?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Get a typed value by deserializing from JSON.
    ///
    /// A stored value of a different shape is reported as a serialization error.
    async fn get_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        name: &str,
    ) -> AppResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get(name).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Set a typed value by serializing to JSON.
    async fn set_json<T: serde::Serialize + Send + Sync>(
        &self,
        name: &str,
        value: &T,
        expire: Option<u64>,
    ) -> AppResult<bool>
    where
        Self: Sized,
    {
        let value = serde_json::to_value(value)?;
        self.set(name, &value, expire).await
    }
}
