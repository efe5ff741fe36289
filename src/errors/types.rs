//! Error type definitions for catalogd
//!
//! This module defines the error hierarchy used throughout the application.
//! The interesting part is [`ErrorKind`]: every upstream failure is classified
//! into one of these kinds, and the same kinds drive retry policy, enrichment
//! cooldown arithmetic, and metric labels.

use std::time::Duration;

use thiserror::Error;

/// Classification of an upstream request outcome.
///
/// The kind is persisted on catalog rows (`tmdb_error_kind`) and used as a
/// metric label, so the string form is stable snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Ok,
    RateLimited,
    Server,
    Timeout,
    Network,
    Auth,
    NotFound,
    Invalid,
    Unknown,
}

impl ErrorKind {
    /// Whether a request that failed with this kind should be retried locally.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Server | ErrorKind::Timeout | ErrorKind::Network
        )
    }

    /// Whether this kind counts as transient for enrichment cooldown purposes.
    pub fn is_transient(self) -> bool {
        self.is_retryable()
    }

    /// Upper bound for the exponential backoff applied between retries.
    pub fn backoff_cap(self) -> Duration {
        match self {
            ErrorKind::RateLimited => Duration::from_secs(30),
            _ => Duration::from_secs(10),
        }
    }
}

/// A classified upstream request failure.
///
/// Produced by the fetcher after retries are exhausted (or immediately for
/// non-retryable kinds) and consumed by the L2 engines.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }
}

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Classified upstream request failures
    #[error("Upstream error: {0}")]
    Fetch(#[from] FetchError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn error_kind_string_form_is_snake_case() {
        assert_eq!(ErrorKind::RateLimited.to_string(), "rate_limited");
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(ErrorKind::from_str("timeout").unwrap(), ErrorKind::Timeout);
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::Server.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::Network.is_retryable());
        assert!(!ErrorKind::Auth.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::Invalid.is_retryable());
    }

    #[test]
    fn rate_limited_backoff_cap_is_higher() {
        assert_eq!(ErrorKind::RateLimited.backoff_cap(), Duration::from_secs(30));
        assert_eq!(ErrorKind::Server.backoff_cap(), Duration::from_secs(10));
    }
}
