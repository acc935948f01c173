//! Unified error handling for the slotcast crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`SlotcastErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use slotcast::error::{Error, ErrorCategory, SlotcastErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(category = ?err.category(), "Recovering: {err}");
//!     } else {
//!         tracing::error!("Fatal error: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::cache::{CacheError, DecodeError};
pub use crate::fetcher::{FetchError, TransportError};
pub use crate::models::ScheduleError;
pub use crate::scheduler::{RetryError, SchedulerError};
pub use crate::storage::StoreError;

/// Common trait for all slotcast error types
///
/// This trait provides a unified interface for error handling across
/// all modules, enabling consistent error processing strategies.
pub trait SlotcastErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried or worked around)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, status)
    Network,
    /// Document and timestamp parsing errors
    Parsing,
    /// Persistent store and I/O errors
    Storage,
    /// Image cache and decoding errors
    Cache,
    /// Scheduler and timing errors
    Scheduler,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Cache => "cache",
            Self::Scheduler => "scheduler",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

// ============================================================================
// Domain error classification
// ============================================================================

impl SlotcastErrorTrait for TransportError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUrl(_) => ErrorCategory::Config,
            _ => ErrorCategory::Network,
        }
    }
}

impl SlotcastErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        // Every fetch failure is retried or covered by the persisted schedule
        match self {
            Self::Transport(e) => e.is_recoverable(),
            _ => true,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(e) => e.category(),
            Self::MalformedDocument(_) | Self::MalformedTimestamp { .. } | Self::Invalid(_) => {
                ErrorCategory::Parsing
            }
            Self::AlreadyExpired { .. } => ErrorCategory::Scheduler,
        }
    }
}

impl SlotcastErrorTrait for ScheduleError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

impl SlotcastErrorTrait for StoreError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

impl SlotcastErrorTrait for DecodeError {
    fn is_recoverable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Download { .. } => ErrorCategory::Network,
            Self::Format { .. } | Self::Task(_) => ErrorCategory::Cache,
        }
    }
}

impl SlotcastErrorTrait for CacheError {
    fn is_recoverable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Cache
    }
}

impl SlotcastErrorTrait for SchedulerError {
    fn is_recoverable(&self) -> bool {
        SchedulerError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ScheduleExpired { .. } => ErrorCategory::Scheduler,
            Self::InvalidConfig { .. } => ErrorCategory::Config,
        }
    }
}

impl SlotcastErrorTrait for RetryError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Scheduler
    }
}

// ============================================================================
// Unified Error
// ============================================================================

/// Unified error type for the slotcast crate
///
/// This enum wraps all domain-specific errors, providing a single error type
/// that can be used across module boundaries while preserving the detailed
/// error information.
#[derive(Error, Debug)]
pub enum Error {
    /// Schedule fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Transport errors outside a fetch
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Schedule validation errors
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Image cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Image decode errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Scheduler and timing errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Schedule could not be obtained
    #[error("Retry error: {0}")]
    Retry(#[from] RetryError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SlotcastErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Transport(e) => e.is_recoverable(),
            Self::Schedule(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            Self::Cache(e) => e.is_recoverable(),
            Self::Decode(e) => e.is_recoverable(),
            Self::Scheduler(e) => SlotcastErrorTrait::is_recoverable(e),
            Self::Retry(e) => e.is_recoverable(),
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Http(_) => true, // HTTP errors are often transient
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Transport(e) => e.category(),
            Self::Schedule(e) => e.category(),
            Self::Store(e) => e.category(),
            Self::Cache(e) => e.category(),
            Self::Decode(e) => e.category(),
            Self::Scheduler(e) => e.category(),
            Self::Retry(e) => e.category(),
            Self::Http(_) => ErrorCategory::Network,
            Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Parsing,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this is the terminal "no schedule" condition
    pub fn is_unrecoverable_schedule(&self) -> bool {
        matches!(self, Self::Retry(RetryError::Unrecoverable { .. }))
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MissReason;

    #[test]
    fn test_error_category() {
        let fetch_err = Error::Fetch(FetchError::Transport(TransportError::Timeout));
        assert_eq!(fetch_err.category(), ErrorCategory::Network);

        let parse_err = Error::Fetch(FetchError::MalformedTimestamp {
            slot_id: "a".to_string(),
            raw: "zz".to_string(),
        });
        assert_eq!(parse_err.category(), ErrorCategory::Parsing);

        let expired = Error::Fetch(FetchError::AlreadyExpired { end_time: 0 });
        assert_eq!(expired.category(), ErrorCategory::Scheduler);
    }

    #[test]
    fn test_is_recoverable() {
        let miss = Error::Cache(CacheError::Miss {
            url: "https://cdn.test/a.png".to_string(),
            reason: MissReason::Timeout,
        });
        assert!(miss.is_recoverable());

        let invalid = Error::Schedule(ScheduleError::Empty);
        assert!(!invalid.is_recoverable());

        let bad_url = Error::Transport(TransportError::InvalidUrl("x".to_string()));
        assert!(!bad_url.is_recoverable());
        assert_eq!(bad_url.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_unrecoverable_schedule() {
        let err: Error = RetryError::Unrecoverable {
            attempts: 3,
            last_reason: None,
        }
        .into();
        assert!(err.is_unrecoverable_schedule());
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Scheduler);
    }

    #[test]
    fn test_error_conversion() {
        let scheduler_err = SchedulerError::schedule_expired(0, 1);
        let unified: Error = scheduler_err.into();
        assert!(matches!(unified, Error::Scheduler(_)));
        assert!(unified.is_recoverable());
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("Invalid screen id");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_other_error() {
        let err = Error::other("Something went wrong");
        assert_eq!(err.category(), ErrorCategory::Other);
        assert_eq!(ErrorCategory::Other.as_str(), "other");
    }
}
