//! Retry controller
//!
//! Wraps [`ScheduleFetcher::fetch`] with the recovery policy:
//!
//! | Outcome | Action | Cooldown |
//! |---------|--------|----------|
//! | valid schedule | persist and return it | - |
//! | already expired | discard, retry | `expired_cooldown` (180s) |
//! | any other failure | return the persisted schedule if unexpired, else retry | `failure_cooldown` (30s) |
//!
//! At most one fetch is outstanding at any time. Callers that arrive while
//! another call is fetching or cooling down wait for it and share its
//! result instead of stacking a second fetch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::fetcher::{FetchError, ScheduleFetcher};
use crate::models::Schedule;
use crate::storage::ScheduleStore;

// ============================================================================
// Policy
// ============================================================================

/// Why an attempt did not yield a usable schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// The fetched schedule had already ended
    Expired,
    /// The fetch failed and no persisted fallback was usable
    Failed,
}

/// Cooldown table and attempt cap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub expired_cooldown: Duration,
    pub failure_cooldown: Duration,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            expired_cooldown: Duration::from_secs(180),
            failure_cooldown: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Fixed cooldown for a failure reason
    pub fn cooldown_for(&self, reason: RetryReason) -> Duration {
        match reason {
            RetryReason::Expired => self.expired_cooldown,
            RetryReason::Failed => self.failure_cooldown,
        }
    }

    /// Whether `attempts` has used up the cap
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Progress of the current `obtain` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempts: u32,
    pub last_reason: Option<RetryReason>,
    pub next_delay: Option<Duration>,
}

impl RetryState {
    /// Record a failed attempt and return the cooldown before the next one
    pub fn record_failure(&mut self, reason: RetryReason, policy: &RetryPolicy) -> Duration {
        let delay = policy.cooldown_for(reason);
        self.last_reason = Some(reason);
        self.next_delay = Some(delay);
        delay
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Where an obtained schedule came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSource {
    /// Freshly fetched and persisted
    Remote,
    /// Last-known-good schedule from the store
    Persisted,
}

/// A usable, unexpired schedule
#[derive(Debug, Clone)]
pub struct ObtainedSchedule {
    pub schedule: Arc<Schedule>,
    pub source: ScheduleSource,
}

/// Retry controller errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// The attempt cap was reached without a usable schedule
    #[error("No usable schedule after {attempts} attempts (last: {last_reason:?})")]
    Unrecoverable {
        attempts: u32,
        last_reason: Option<RetryReason>,
    },
}

struct Gate {
    state: RetryState,
    last_obtained: Option<ObtainedSchedule>,
}

/// Single-flight schedule acquisition with fallback and cooldowns
pub struct RetryController {
    fetcher: ScheduleFetcher,
    store: ScheduleStore,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    gate: Mutex<Gate>,
    /// Completed `obtain` calls; lets waiters detect a shared result
    completed: AtomicU64,
}

impl RetryController {
    pub fn new(
        fetcher: ScheduleFetcher,
        store: ScheduleStore,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            store,
            clock,
            policy,
            gate: Mutex::new(Gate {
                state: RetryState::default(),
                last_obtained: None,
            }),
            completed: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Startup path: use the persisted schedule when it is still valid
    ///
    /// An expired persisted schedule is removed. Returns `None` when a fetch
    /// is needed.
    pub async fn resume(&self) -> Option<ObtainedSchedule> {
        let schedule = self.load_persisted().await?;
        tracing::info!(slots = schedule.len(), "Resuming persisted schedule");
        Some(ObtainedSchedule {
            schedule: Arc::new(schedule),
            source: ScheduleSource::Persisted,
        })
    }

    /// Obtain a usable schedule, retrying per policy
    ///
    /// # Errors
    ///
    /// Returns `RetryError::Unrecoverable` once `max_attempts` attempts have
    /// failed; never returns an error when no cap is configured.
    pub async fn obtain(&self) -> Result<ObtainedSchedule, RetryError> {
        let ticket = self.completed.load(Ordering::SeqCst);
        let mut gate = self.gate.lock().await;

        if self.completed.load(Ordering::SeqCst) != ticket {
            if let Some(shared) = gate.last_obtained.clone() {
                tracing::debug!("Sharing schedule obtained by a concurrent caller");
                return Ok(shared);
            }
        }

        loop {
            gate.state.attempts += 1;
            let attempt = gate.state.attempts;

            match self.attempt_once().await {
                Ok(obtained) => {
                    tracing::info!(attempt, source = ?obtained.source, "Obtained schedule");
                    gate.state.reset();
                    gate.last_obtained = Some(obtained.clone());
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    return Ok(obtained);
                }
                Err(reason) => {
                    if self.policy.is_exhausted(attempt) {
                        tracing::error!(attempt, reason = ?reason, "Giving up on schedule");
                        gate.state.reset();
                        gate.last_obtained = None;
                        self.completed.fetch_add(1, Ordering::SeqCst);
                        return Err(RetryError::Unrecoverable {
                            attempts: attempt,
                            last_reason: Some(reason),
                        });
                    }

                    let cooldown = gate.state.record_failure(reason, &self.policy);
                    tracing::warn!(
                        attempt,
                        reason = ?reason,
                        cooldown_secs = cooldown.as_secs(),
                        "No usable schedule, retrying after cooldown"
                    );
                    tokio::time::sleep(cooldown).await;
                }
            }
        }
    }

    /// One policy step: fetch, then fall back to the store on failure
    async fn attempt_once(&self) -> Result<ObtainedSchedule, RetryReason> {
        match self.fetcher.fetch().await {
            Ok(schedule) => {
                if let Err(e) = self.store.save(&schedule).await {
                    tracing::warn!(error = %e, "Failed to persist schedule");
                }
                Ok(ObtainedSchedule {
                    schedule: Arc::new(schedule),
                    source: ScheduleSource::Remote,
                })
            }
            Err(FetchError::AlreadyExpired { end_time }) => {
                tracing::warn!(end_time, "Fetched schedule is already expired");
                Err(RetryReason::Expired)
            }
            Err(e) => {
                tracing::warn!(error = %e, transport = e.is_transport(), "Schedule fetch failed");
                match self.load_persisted().await {
                    Some(schedule) => {
                        tracing::info!(slots = schedule.len(), "Falling back to persisted schedule");
                        Ok(ObtainedSchedule {
                            schedule: Arc::new(schedule),
                            source: ScheduleSource::Persisted,
                        })
                    }
                    None => Err(RetryReason::Failed),
                }
            }
        }
    }

    /// Persisted schedule if present and unexpired; expired ones are removed
    async fn load_persisted(&self) -> Option<Schedule> {
        let schedule = match self.store.load().await {
            Ok(Some(schedule)) => schedule,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted schedule");
                return None;
            }
        };

        if schedule.is_expired_at(self.clock.now_millis()) {
            tracing::info!("Persisted schedule has expired; removing it");
            if let Err(e) = self.store.clear().await {
                tracing::warn!(error = %e, "Failed to clear persisted schedule");
            }
            return None;
        }

        Some(schedule)
    }
}
