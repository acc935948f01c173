//! Slot activation analytics
//!
//! Every time a slot becomes active the scheduler reports one
//! `slot_transition` event per ad position to an [`EventSink`]. Sinks are
//! fire-and-forget: recording never fails and never blocks scheduling.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotcast::analytics::{ChannelEventSink, SlotTransitionEvent};
//!
//! let (sink, mut events) = ChannelEventSink::new();
//! for event in SlotTransitionEvent::for_slot(&slot, "screen-1") {
//!     sink.record(event);
//! }
//! assert_eq!(events.recv().await.unwrap().ad_position, AdPosition::Top);
//! ```

use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::{AdPosition, Slot};

/// Event name reported on slot activation
pub const SLOT_TRANSITION: &str = "slot_transition";

/// One ad position of a newly active slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotTransitionEvent {
    pub name: &'static str,
    pub slot_id: String,
    pub advertiser_id: String,
    pub ad_position: AdPosition,
    pub device_id: String,
    pub screen_id: String,
    /// Analytics stream of the displayed image
    pub stream_id: String,
}

impl SlotTransitionEvent {
    /// Build the event for one position of `slot`
    pub fn new(slot: &Slot, position: AdPosition, screen_id: &str) -> Self {
        let stream_id = match position {
            AdPosition::Top => &slot.attribution.top_stream_id,
            AdPosition::Bottom => &slot.attribution.footer_stream_id,
        };

        Self {
            name: SLOT_TRANSITION,
            slot_id: slot.id.clone(),
            advertiser_id: slot.advertiser_id(position).to_string(),
            ad_position: position,
            device_id: slot.attribution.device_id.clone(),
            screen_id: screen_id.to_string(),
            stream_id: stream_id.clone(),
        }
    }

    /// Events for a slot activation, top first
    pub fn for_slot(slot: &Slot, screen_id: &str) -> [Self; 2] {
        [
            Self::new(slot, AdPosition::Top, screen_id),
            Self::new(slot, AdPosition::Bottom, screen_id),
        ]
    }
}

/// Receives slot activation events
pub trait EventSink: Send + Sync {
    fn record(&self, event: SlotTransitionEvent);
}

/// Writes events to the `slotcast::analytics` tracing target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: SlotTransitionEvent) {
        tracing::info!(
            target: "slotcast::analytics",
            event = event.name,
            slot_id = %event.slot_id,
            advertiser_id = %event.advertiser_id,
            ad_position = event.ad_position.as_str(),
            device_id = %event.device_id,
            screen_id = %event.screen_id,
            stream_id = %event.stream_id,
            "Slot transition"
        );
    }
}

/// Forwards events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<SlotTransitionEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SlotTransitionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn record(&self, event: SlotTransitionEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("Analytics receiver dropped; event discarded");
        }
    }
}
