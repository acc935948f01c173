//! Error types for the scheduler module

use std::fmt;

use crate::clock::{format_millis, EpochMillis};

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The schedule ended at or before the activation instant
    ScheduleExpired {
        end_time: EpochMillis,
        now: EpochMillis,
    },

    /// Scheduler configuration error
    InvalidConfig {
        field: String,
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScheduleExpired { end_time, now } => {
                write!(
                    f,
                    "Schedule expired at {} (now {})",
                    format_millis(*end_time),
                    format_millis(*now)
                )
            }
            Self::InvalidConfig { field, reason } => {
                write!(f, "Scheduler config error in '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create a schedule expired error
    pub fn schedule_expired(end_time: EpochMillis, now: EpochMillis) -> Self {
        Self::ScheduleExpired { end_time, now }
    }

    /// Create a config error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable
    ///
    /// An expired schedule is recovered by fetching a fresh one.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ScheduleExpired { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_expired_error() {
        let err = SchedulerError::schedule_expired(0, 1000);
        assert!(err.to_string().contains("1970-01-01T00:00:00"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_invalid_config_error() {
        let err = SchedulerError::invalid_config("lookahead_slots", "must be positive");
        assert!(err.to_string().contains("lookahead_slots"));
        assert!(!err.is_recoverable());
    }
}
