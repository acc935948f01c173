//! Composition root and main loop
//!
//! [`Player`] wires the fetcher, store, retry controller, image cache,
//! scheduler, event sink and display together and drives them:
//!
//! 1. Resume the persisted schedule, or obtain one through the retry
//!    controller.
//! 2. Activate it. An activation that finds the schedule already expired
//!    drops it and obtains another.
//! 3. On every timer fire, advance; present each new slot with the images
//!    the cache can provide. On exhaustion, obtain a new schedule, clear the
//!    cache if it differs, and activate it.
//! 4. If the retry controller gives up, tell the display and stop with an
//!    error so the host can restart the process.

use std::future::Future;
use std::sync::Arc;

use crate::analytics::{EventSink, TracingEventSink};
use crate::cache::{HttpImageDecoder, ImageCache, ImageDecoder};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::display::{DisplaySurface, LoggingDisplay};
use crate::error::{Error, Result};
use crate::fetcher::{HttpTransport, ScheduleFetcher, ScheduleTransport};
use crate::models::Schedule;
use crate::scheduler::{
    Activation, ObtainedSchedule, RetryController, SchedulerError, SlotChange, SlotScheduler,
    Transition,
};
use crate::storage::{BlobStore, FileStore, ScheduleStore};

/// Collaborators a player is assembled from
pub struct PlayerParts {
    pub transport: Arc<dyn ScheduleTransport>,
    pub blobs: Arc<dyn BlobStore>,
    pub decoder: Arc<dyn ImageDecoder>,
    pub sink: Arc<dyn EventSink>,
    pub display: Arc<dyn DisplaySurface>,
    pub clock: Arc<dyn Clock>,
}

/// Plays schedules for one screen
pub struct Player {
    scheduler: SlotScheduler,
    retry: Arc<RetryController>,
    cache: Arc<ImageCache>,
    display: Arc<dyn DisplaySurface>,
}

impl Player {
    /// Assemble a player from explicit collaborators
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler settings in `config` are invalid
    pub fn new(config: &Config, parts: PlayerParts) -> Result<Self> {
        let store = ScheduleStore::new(parts.blobs);
        let cache = Arc::new(ImageCache::new(config.cache_config(), parts.decoder));
        let fetcher = ScheduleFetcher::new(
            parts.transport,
            Arc::clone(&parts.clock),
            config.source.screen_id.clone(),
        );
        let retry = Arc::new(RetryController::new(
            fetcher,
            store.clone(),
            Arc::clone(&parts.clock),
            config.retry_policy(),
        ));
        let scheduler = SlotScheduler::new(
            parts.clock,
            Arc::clone(&cache),
            parts.sink,
            store,
            config.scheduler.lookahead_slots,
        )?;

        Ok(Self {
            scheduler,
            retry,
            cache,
            display: parts.display,
        })
    }

    /// Assemble the production player: HTTP transport and decoder, file
    /// store, tracing analytics and a logging display
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid base URL or scheduler settings, or
    /// if an HTTP client cannot be built
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport =
            HttpTransport::with_timeout(&config.source.base_url, config.request_timeout())?;
        let decoder = HttpImageDecoder::new(config.request_timeout())?;

        Self::new(
            config,
            PlayerParts {
                transport: Arc::new(transport),
                blobs: Arc::new(FileStore::new(&config.storage.data_dir)),
                decoder: Arc::new(decoder),
                sink: Arc::new(TracingEventSink),
                display: Arc::new(LoggingDisplay),
                clock: Arc::new(SystemClock),
            },
        )
    }

    pub fn scheduler(&self) -> &SlotScheduler {
        &self.scheduler
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Play until `shutdown` resolves or no schedule can be obtained
    ///
    /// # Errors
    ///
    /// Returns `Error::Retry` after signalling the display when the retry
    /// controller gives up.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let outcome = tokio::select! {
            result = self.play() => result,
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested");
                Ok(())
            }
        };

        self.scheduler.deactivate();
        outcome
    }

    /// Resume or obtain a schedule and activate it
    pub async fn start(&mut self) -> Result<()> {
        let obtained = match self.retry.resume().await {
            Some(obtained) => obtained,
            None => self.obtain().await?,
        };
        self.install(obtained).await
    }

    /// Wait for the next timer fire and handle it
    pub async fn step(&mut self) -> Result<()> {
        let fired = self.scheduler.timer_fired().await;
        let previous = self.scheduler.schedule();

        match self.scheduler.on_timer_fired(fired).await {
            Transition::Advanced(change) => self.present(&change).await,
            Transition::Exhausted => {
                let obtained = self.obtain().await?;
                self.supersede(previous.as_deref(), &obtained.schedule).await;
                self.install(obtained).await?;
            }
            Transition::Stale => {}
        }

        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        self.start().await?;
        loop {
            self.step().await?;
        }
    }

    async fn obtain(&self) -> Result<ObtainedSchedule> {
        match self.retry.obtain().await {
            Ok(obtained) => Ok(obtained),
            Err(e) => {
                tracing::error!(error = %e, "Schedule unrecoverable");
                self.display.on_schedule_unrecoverable();
                Err(e.into())
            }
        }
    }

    /// Activate `obtained`, replacing it while activation finds it expired
    async fn install(&mut self, mut obtained: ObtainedSchedule) -> Result<()> {
        loop {
            match self.scheduler.activate(Arc::clone(&obtained.schedule)).await {
                Ok(Activation::Slot(change)) => {
                    self.present(&change).await;
                    return Ok(());
                }
                Ok(Activation::Waiting { starts_in }) => {
                    tracing::info!(starts_in_ms = starts_in.as_millis() as u64, "Waiting for first slot");
                    return Ok(());
                }
                Err(SchedulerError::ScheduleExpired { .. }) => {
                    let previous = Arc::clone(&obtained.schedule);
                    obtained = self.obtain().await?;
                    self.supersede(Some(&previous), &obtained.schedule).await;
                }
                Err(e) => return Err(Error::from(e)),
            }
        }
    }

    async fn supersede(&self, previous: Option<&Schedule>, next: &Schedule) {
        if previous != Some(next) {
            self.cache.clear().await;
        }
    }

    /// Resolve the slot's images and hand them to the display
    async fn present(&self, change: &SlotChange) {
        let slot = &change.slot;
        let (top, footer) = tokio::join!(
            self.cache.get(&slot.top_image),
            self.cache.get(&slot.footer_image)
        );

        let top = top
            .map_err(|e| tracing::debug!(slot_id = %slot.id, error = %e, "Top image unavailable"))
            .ok();
        let footer = footer
            .map_err(|e| tracing::debug!(slot_id = %slot.id, error = %e, "Footer image unavailable"))
            .ok();

        self.display.on_slot_activated(slot, top, footer);
    }
}
