//! Redis cache backend.

#[cfg(feature = "redis-backend")]
pub mod client;
pub mod operations;

#[cfg(feature = "redis-backend")]
pub use client::RedisClient;
pub use operations::RedisDriver;
