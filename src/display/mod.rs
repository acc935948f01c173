//! Rendering-layer boundary
//!
//! The engine does not draw. It hands each newly active slot, together with
//! whatever decoded images the cache could provide, to a [`DisplaySurface`].
//! A missing image means the surface renders nothing for that position.

use std::sync::Arc;

use crate::cache::DecodedImage;
use crate::models::Slot;

/// Receives slot changes and the terminal failure signal
pub trait DisplaySurface: Send + Sync {
    /// Called each time the active slot changes
    fn on_slot_activated(
        &self,
        slot: &Slot,
        top: Option<Arc<DecodedImage>>,
        footer: Option<Arc<DecodedImage>>,
    );

    /// Called when no schedule can be obtained and nothing is left to show.
    /// The expected response is a full restart.
    fn on_schedule_unrecoverable(&self);
}

/// Surface that only logs, for headless runs
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDisplay;

impl DisplaySurface for LoggingDisplay {
    fn on_slot_activated(
        &self,
        slot: &Slot,
        top: Option<Arc<DecodedImage>>,
        footer: Option<Arc<DecodedImage>>,
    ) {
        tracing::info!(
            slot_id = %slot.id,
            top = top.is_some(),
            footer = footer.is_some(),
            "Displaying slot"
        );
    }

    fn on_schedule_unrecoverable(&self) {
        tracing::error!("No schedule available; display needs a restart");
    }
}
