//! Slot scheduler
//!
//! Walks a [`Schedule`] slot by slot against wall-clock time. Activation
//! locates the slot containing *now*, reports it to the event sink, submits
//! the lookahead window to the image cache and arms the transition timer.
//! The window is the configured lookahead clipped to what the cache can hold
//! next to the slot on screen, so prefetching never evicts upcoming images.
//! Each timer fire advances by exactly one slot and re-arms with a
//! drift-corrected delay: the remaining time of the new slot measured from
//! its absolute start, so lateness never accumulates.
//!
//! ```text
//! Idle ──activate──▶ Waiting ──fire──▶ Active(0) ──fire──▶ Active(1) ─ … ─▶ Exhausted ──▶ Idle
//!          └──────────────────────────────▲
//! ```
//!
//! Exhaustion clears the persisted schedule and hands control back to the
//! caller, which obtains a new schedule and activates it.

use std::sync::Arc;
use std::time::Duration;

use super::error::{SchedulerError, SchedulerResult};
use super::timer::{TimerFired, TransitionTimer};
use crate::analytics::{EventSink, SlotTransitionEvent};
use crate::cache::ImageCache;
use crate::clock::Clock;
use crate::models::{Schedule, Slot, SlotLocation};
use crate::storage::ScheduleStore;

/// Default number of upcoming slots kept prefetched
pub const DEFAULT_LOOKAHEAD_SLOTS: usize = 120;

/// A slot that just became active
#[derive(Debug, Clone, PartialEq)]
pub struct SlotChange {
    pub index: usize,
    pub slot: Slot,
    /// Delay armed until the next transition
    pub arm_delay: Duration,
}

/// Result of activating a schedule
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// A slot is active now
    Slot(SlotChange),
    /// The first slot starts later; the timer is armed for its start
    Waiting { starts_in: Duration },
}

/// Result of handling a timer fire
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Moved to the next slot
    Advanced(SlotChange),
    /// Past the last slot; a new schedule is needed
    Exhausted,
    /// The fire belonged to a cancelled or superseded timer
    Stale,
}

#[derive(Debug)]
struct ActiveSchedule {
    schedule: Arc<Schedule>,
    /// `None` while waiting for the first slot
    current: Option<usize>,
}

/// Drives slot transitions for one schedule at a time
pub struct SlotScheduler {
    clock: Arc<dyn Clock>,
    cache: Arc<ImageCache>,
    sink: Arc<dyn EventSink>,
    store: ScheduleStore,
    lookahead: usize,
    timer: TransitionTimer,
    active: Option<ActiveSchedule>,
}

impl SlotScheduler {
    /// Create an idle scheduler
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if `lookahead` is zero
    pub fn new(
        clock: Arc<dyn Clock>,
        cache: Arc<ImageCache>,
        sink: Arc<dyn EventSink>,
        store: ScheduleStore,
        lookahead: usize,
    ) -> SchedulerResult<Self> {
        if lookahead == 0 {
            return Err(SchedulerError::invalid_config(
                "lookahead_slots",
                "must be at least 1",
            ));
        }

        Ok(Self {
            clock,
            cache,
            sink,
            store,
            lookahead,
            timer: TransitionTimer::new(),
            active: None,
        })
    }

    /// Activate `schedule`, superseding any active one
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ScheduleExpired` when now is at or past the
    /// schedule end. Nothing is armed in that case and the scheduler is idle.
    pub async fn activate(&mut self, schedule: Arc<Schedule>) -> SchedulerResult<Activation> {
        self.deactivate();

        let now = self.clock.now_millis();
        match schedule.locate(now) {
            SlotLocation::Expired => {
                tracing::warn!(
                    screen_id = schedule.screen_id(),
                    end_time = schedule.end_time(),
                    now,
                    "Refusing to activate expired schedule"
                );
                Err(SchedulerError::schedule_expired(schedule.end_time(), now))
            }
            SlotLocation::BeforeStart => {
                let window_end = self.prefetch_window().min(schedule.len());
                self.prefetch_range(&schedule, 0, window_end).await;

                let starts_in = Duration::from_millis((schedule.date() - now).max(0) as u64);
                self.timer.arm(starts_in);

                tracing::info!(
                    screen_id = schedule.screen_id(),
                    slots = schedule.len(),
                    arm_delay_ms = starts_in.as_millis() as u64,
                    "Schedule activated; waiting for first slot"
                );

                self.active = Some(ActiveSchedule {
                    schedule,
                    current: None,
                });
                Ok(Activation::Waiting { starts_in })
            }
            SlotLocation::Active(index) => {
                let change = self.enter_slot(&schedule, index, now);

                self.prefetch_ahead(&schedule, index).await;

                self.timer.arm(change.arm_delay);

                tracing::info!(
                    screen_id = schedule.screen_id(),
                    slots = schedule.len(),
                    index,
                    slot_id = %change.slot.id,
                    arm_delay_ms = change.arm_delay.as_millis() as u64,
                    "Schedule activated"
                );

                self.active = Some(ActiveSchedule {
                    schedule,
                    current: Some(index),
                });
                Ok(Activation::Slot(change))
            }
        }
    }

    /// Wait for the armed transition timer
    ///
    /// Pends forever while idle. Cancel safe, so it can sit in a `select!`.
    pub async fn timer_fired(&mut self) -> TimerFired {
        self.timer.fired().await
    }

    /// Advance after a timer fire
    ///
    /// Moves to the next slot and re-arms with the drift-corrected delay
    /// `duration(next) - (now - start(next))`, floored at zero. Past the
    /// last slot the persisted schedule is cleared and the scheduler goes
    /// idle.
    pub async fn on_timer_fired(&mut self, fired: TimerFired) -> Transition {
        if fired.generation != self.timer.generation() {
            return Transition::Stale;
        }
        let Some(active) = self.active.as_ref() else {
            return Transition::Stale;
        };

        let schedule = Arc::clone(&active.schedule);
        let next = active.current.map_or(0, |index| index + 1);

        if next >= schedule.len() {
            self.deactivate();
            tracing::info!(
                screen_id = schedule.screen_id(),
                slots = schedule.len(),
                "Schedule exhausted"
            );
            if let Err(e) = self.store.clear().await {
                tracing::warn!(error = %e, "Failed to clear persisted schedule");
            }
            return Transition::Exhausted;
        }

        let now = self.clock.now_millis();
        let change = self.enter_slot(&schedule, next, now);

        // Keep the window full; already cached images are no-ops
        self.prefetch_ahead(&schedule, next).await;

        self.timer.arm(change.arm_delay);
        if let Some(active) = self.active.as_mut() {
            active.current = Some(next);
        }

        tracing::debug!(
            index = next,
            slot_id = %change.slot.id,
            arm_delay_ms = change.arm_delay.as_millis() as u64,
            "Advanced to slot"
        );

        Transition::Advanced(change)
    }

    /// Cancel the armed timer and go idle; idempotent
    pub fn deactivate(&mut self) {
        self.timer.cancel();
        if let Some(active) = self.active.take() {
            tracing::debug!(screen_id = active.schedule.screen_id(), "Schedule deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Index of the active slot, `None` when idle or waiting
    pub fn current_index(&self) -> Option<usize> {
        self.active.as_ref().and_then(|active| active.current)
    }

    pub fn schedule(&self) -> Option<Arc<Schedule>> {
        self.active.as_ref().map(|active| Arc::clone(&active.schedule))
    }

    /// Delay of the armed transition timer
    pub fn armed_delay(&self) -> Option<Duration> {
        self.timer.armed_delay()
    }

    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    /// Slots prefetched ahead of the current one
    ///
    /// The configured lookahead, clipped so the window's two images per slot
    /// plus the images on screen fit in the cache.
    pub fn prefetch_window(&self) -> usize {
        let fits = (self.cache.capacity() / 2).saturating_sub(1).max(1);
        self.lookahead.min(fits)
    }

    /// Report `index` to the event sink and compute its arm delay
    fn enter_slot(&self, schedule: &Schedule, index: usize, now: i64) -> SlotChange {
        let slot = schedule.slots()[index].clone();
        for event in SlotTransitionEvent::for_slot(&slot, schedule.screen_id()) {
            self.sink.record(event);
        }

        SlotChange {
            index,
            arm_delay: schedule.remaining_in_slot(index, now),
            slot,
        }
    }

    /// Prefetch the window of slots following `index`
    async fn prefetch_ahead(&self, schedule: &Schedule, index: usize) {
        let start = index + 1;
        let end = (start + self.prefetch_window()).min(schedule.len());
        self.prefetch_range(schedule, start, end).await;
    }

    async fn prefetch_range(&self, schedule: &Schedule, start: usize, end: usize) {
        let mut started = 0usize;
        for slot in schedule.slots().get(start..end).unwrap_or_default() {
            for image in [&slot.top_image, &slot.footer_image] {
                if self.cache.prefetch_for(image, slot.start_time).await {
                    started += 1;
                }
            }
        }

        if started > 0 {
            tracing::debug!(start, end, started, "Prefetching slot images");
        }
    }
}

impl std::fmt::Debug for SlotScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotScheduler")
            .field("lookahead", &self.lookahead)
            .field("prefetch_window", &self.prefetch_window())
            .field("current_index", &self.current_index())
            .field("armed_delay", &self.armed_delay())
            .finish()
    }
}
