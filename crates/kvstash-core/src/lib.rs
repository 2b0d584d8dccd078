//! # kvstash-core
//!
//! Core crate for kvstash. Contains the seam traits implemented by the
//! storage and cache crates, configuration schemas, the clock used for
//! expiration checks, value helpers, and the unified error system.
//!
//! This crate has **no** internal dependencies on other kvstash crates.

pub mod clock;
pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod value;

pub use error::AppError;
pub use result::AppResult;
