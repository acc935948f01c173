//! Slot scheduling and schedule acquisition
//!
//! # Overview
//!
//! The scheduler turns an immutable [`Schedule`](crate::models::Schedule)
//! into a sequence of timed slot activations and keeps a usable schedule
//! available when the current one runs out.
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────────┐  obtain()   ┌────────────────────┐  fetch()  ┌─────────────────┐
//!   │  SlotScheduler   │◀────────────│  RetryController   │──────────▶│ ScheduleFetcher │
//!   │  (slot + timer)  │             │  (policy + gate)   │           └─────────────────┘
//!   └───┬─────────┬────┘             └─────────┬──────────┘
//!       │         │ prefetch                   │ load / save / clear
//!       │ events  ▼                            ▼
//!       │   ┌────────────┐             ┌───────────────┐
//!       ▼   │ ImageCache │             │ ScheduleStore │
//!  EventSink└────────────┘             └───────────────┘
//! ```
//!
//! # Modules
//!
//! - [`slot`] - Activation, drift-corrected transitions, lookahead prefetch
//! - [`timer`] - Cancellable one-shot timer with stale-fire protection
//! - [`retry`] - Single-flight fetch with store fallback and cooldowns
//! - [`error`] - Scheduler errors
//!
//! # Retry Settings
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `expired_cooldown_secs` | 180 | Wait after fetching an already-expired schedule |
//! | `failure_cooldown_secs` | 30 | Wait after a failed fetch with no fallback |
//! | `max_attempts` | none | Attempts before escalating as unrecoverable |
//! | `lookahead_slots` | 120 | Upcoming slots kept prefetched |

pub mod error;
pub mod retry;
pub mod slot;
pub mod timer;

pub use error::{SchedulerError, SchedulerResult};
pub use retry::{
    ObtainedSchedule, RetryController, RetryError, RetryPolicy, RetryReason, RetryState,
    ScheduleSource,
};
pub use slot::{Activation, SlotChange, SlotScheduler, Transition, DEFAULT_LOOKAHEAD_SLOTS};
pub use timer::{TimerFired, TransitionTimer};
