//! # kvstash-storage
//!
//! File-system primitives for the file cache backend: recursive directory
//! creation, whole-file reads and writes, deletion and listing, all rooted
//! at a base directory.

pub mod local;

pub use local::LocalFileStore;
