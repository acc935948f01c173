//! Injectable wall-clock time source
//!
//! Slot boundaries are absolute instants expressed in milliseconds since the
//! Unix epoch, so every component that needs "now" asks a [`Clock`] instead of
//! reading the system time directly. Tests substitute [`ManualClock`].

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Milliseconds since the Unix epoch
pub type EpochMillis = i64;

/// Source of the current wall-clock instant
pub trait Clock: Send + Sync {
    /// Current instant in milliseconds since the Unix epoch
    fn now_millis(&self) -> EpochMillis;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        Utc::now().timestamp_millis()
    }
}

/// Settable clock for tests and simulations
///
/// Time only moves when [`set`](Self::set) or [`advance`](Self::advance) is
/// called.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `now`
    pub fn new(now: EpochMillis) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Jump to an absolute instant
    pub fn set(&self, now: EpochMillis) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `millis`
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> EpochMillis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Format an epoch-millisecond instant as RFC 3339 for logs and summaries
pub fn format_millis(millis: EpochMillis) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| format!("{millis}ms"))
}
