//! Traits defined in `kvstash-core` and implemented by other crates.

pub mod cache;
pub mod storage;
pub mod store;

pub use cache::CacheDriver;
pub use storage::{FileEntry, FileStore};
pub use store::KeyValueStore;
