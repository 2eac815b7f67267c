//! Convenience result type alias for Wave.

use crate::error::AppError;

/// A specialized `Result` type for Wave operations.
pub type AppResult<T> = Result<T, AppError>;
