//! # kvstash-cache
//!
//! Cache drivers and the cache facade.
//!
//! Two drivers implement [`CacheDriver`](kvstash_core::traits::CacheDriver):
//!
//! - [`FileDriver`] keeps one record file per entry under a root directory,
//!   addressed by the SHA-256 of the cache name, and expires entries
//!   lazily on read.
//! - [`RedisDriver`] stores JSON strings in a Redis-style key/value store
//!   and relies on its native TTL and counters. It runs over a real Redis
//!   server ([`RedisClient`]) or the in-process [`MemoryStore`].
//!
//! [`Cache`] picks one of them from [`CacheConfig`](kvstash_core::config::cache::CacheConfig)
//! and adds tagging.

pub mod backend;
pub mod facade;
pub mod file;
pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod redis;
pub mod tag;

pub use self::backend::{CacheBackend, Handler};
pub use self::facade::Cache;
pub use self::file::FileDriver;
#[cfg(feature = "memory")]
pub use self::memory::MemoryStore;
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisClient;
pub use self::redis::RedisDriver;
pub use self::tag::TagKeys;
