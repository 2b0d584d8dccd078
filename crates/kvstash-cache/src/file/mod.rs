//! File cache backend.

pub mod driver;
pub mod record;

pub use driver::FileDriver;
pub use record::CacheRecord;
