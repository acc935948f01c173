//! slotcast - unattended ad-slot player
//!
//! Plays a remotely fetched schedule of time-boxed ad slots on a screen with no
//! operator: slot transitions follow wall-clock boundaries without drift, slot
//! images are decoded ahead of time into a bounded cache, and the last good
//! schedule is persisted so the screen keeps playing through network outages.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`clock`] - Injectable wall-clock time source
//! - [`models`] - Slots, image references and validated schedules
//! - [`fetcher`] - Schedule transport, raw document parsing and normalization
//! - [`storage`] - Persistent last-known-good schedule
//! - [`scheduler`] - Slot scheduler, transition timer and retry controller
//! - [`cache`] - Bounded image cache and image decoding
//! - [`analytics`] - Slot transition events
//! - [`display`] - Rendering-layer boundary
//! - [`player`] - Composition root and main loop
//! - [`config`] - Configuration management and settings
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use slotcast::config::Config;
//! use slotcast::player::Player;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let mut player = Player::from_config(&config)?;
//!     player.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod cache;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod player;
pub mod scheduler;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{CacheConfig, ImageCache};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, SlotcastErrorTrait};
    pub use crate::fetcher::ScheduleFetcher;
    pub use crate::models::{ImageRef, Schedule, Slot};
    pub use crate::player::Player;
    pub use crate::scheduler::{RetryController, SlotScheduler};
    pub use crate::storage::ScheduleStore;
}

// Direct re-exports for convenience
pub use models::{ImageRef, Schedule, Slot};
