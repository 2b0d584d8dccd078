//! Convenience result type alias for kvstash.

use crate::error::AppError;

/// A specialized `Result` type for kvstash operations.
pub type AppResult<T> = Result<T, AppError>;
