//! Error handling for the catalogd application
//!
//! Re-exports the error types so callers can use `crate::errors::AppError`
//! without reaching into submodules.

pub mod types;

pub use types::{AppError, ErrorKind, FetchError};

/// Convenience result alias used throughout the application
pub type AppResult<T> = Result<T, AppError>;
