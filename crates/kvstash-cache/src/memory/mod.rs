//! In-process key/value store with Redis semantics.

pub mod store;

pub use store::MemoryStore;
