//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use slotcast::cache::{DecodeError, DecodedImage, ImageDecoder};
use slotcast::clock::{Clock, EpochMillis};
use slotcast::display::DisplaySurface;
use slotcast::fetcher::{ScheduleTransport, TransportError};
use slotcast::models::{Attribution, ImageRef, Schedule, ScreenGeometry, Slot};

// ============================================================================
// Clocks
// ============================================================================

/// Wall clock that follows tokio's (pausable) time
///
/// Under `#[tokio::test(start_paused = true)]` the transition timers and
/// this clock advance together, so slot boundaries line up exactly.
pub struct TokioClock {
    origin: EpochMillis,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(origin: EpochMillis) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now_millis(&self) -> EpochMillis {
        self.origin + self.started.elapsed().as_millis() as i64
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Transport serving queued responses, then failing
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<String, TransportError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<String, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    /// Hold every request open for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, response: Result<String, TransportError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScheduleTransport for ScriptedTransport {
    async fn fetch(&self, _screen_id: &str) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Unavailable("offline".to_string())));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Decoder producing blank pixels, counting calls per url
#[derive(Default)]
pub struct CountingDecoder {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl CountingDecoder {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn heal(&self, url: &str) {
        self.failing.lock().unwrap().remove(url);
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl ImageDecoder for CountingDecoder {
    async fn decode(&self, url: &str, width: u32, height: u32) -> Result<DecodedImage, DecodeError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(url) {
            return Err(DecodeError::Format {
                url: url.to_string(),
                reason: "corrupt".to_string(),
            });
        }
        Ok(DecodedImage::new(
            width,
            height,
            vec![0; (width * height * 4) as usize],
        ))
    }
}

// ============================================================================
// Display
// ============================================================================

/// What a display was shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shown {
    pub slot_id: String,
    pub top: bool,
    pub footer: bool,
}

/// Display that records every call
#[derive(Default)]
pub struct RecordingDisplay {
    shown: Mutex<Vec<Shown>>,
    unrecoverable: AtomicUsize,
}

impl RecordingDisplay {
    pub fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    pub fn shown_ids(&self) -> Vec<String> {
        self.shown().into_iter().map(|s| s.slot_id).collect()
    }

    pub fn unrecoverable_count(&self) -> usize {
        self.unrecoverable.load(Ordering::SeqCst)
    }
}

impl DisplaySurface for RecordingDisplay {
    fn on_slot_activated(
        &self,
        slot: &Slot,
        top: Option<Arc<DecodedImage>>,
        footer: Option<Arc<DecodedImage>>,
    ) {
        self.shown.lock().unwrap().push(Shown {
            slot_id: slot.id.clone(),
            top: top.is_some(),
            footer: footer.is_some(),
        });
    }

    fn on_schedule_unrecoverable(&self) {
        self.unrecoverable.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Schedules and documents
// ============================================================================

/// Create a test slot with complete image references
pub fn create_test_slot(id: &str, start_time: EpochMillis) -> Slot {
    Slot {
        id: id.to_string(),
        start_time,
        top_image: ImageRef::new(format!("https://cdn.test/{id}/top.png"), 8, 4),
        footer_image: ImageRef::new(format!("https://cdn.test/{id}/footer.png"), 8, 2),
        attribution: Attribution {
            top_advertiser_id: format!("{id}-top"),
            footer_advertiser_id: format!("{id}-footer"),
            device_id: "device-1".to_string(),
            top_stream_id: format!("{id}-top-stream"),
            footer_stream_id: format!("{id}-footer-stream"),
        },
    }
}

/// Create a schedule with slots `s0, s1, ...` at the given start times
pub fn create_test_schedule(starts: &[EpochMillis]) -> Schedule {
    let slots = starts
        .iter()
        .enumerate()
        .map(|(i, &start)| create_test_slot(&format!("s{i}"), start))
        .collect();
    Schedule::new("screen-1", ScreenGeometry::default(), slots).unwrap()
}

/// Raw schedule document with slots `{prefix}0, {prefix}1, ...`
///
/// Start times are given in milliseconds and must be whole seconds.
pub fn schedule_document(prefix: &str, starts: &[EpochMillis]) -> String {
    let items: Vec<_> = starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            assert_eq!(start % 1000, 0, "document times are whole seconds");
            let id = format!("{prefix}{i}");
            serde_json::json!({
                "ad_time": format!("{:x}", start / 1000),
                "slot_id": id,
                "device_id": "device-1",
                "AdvertiserTop": format!("{id}-top"),
                "AdvertiserBottom": format!("{id}-footer"),
                "IMGtop": format!("https://cdn.test/{id}/top.png"),
                "IMGbottom": format!("https://cdn.test/{id}/footer.png"),
                "IMGtopAnalytics": format!("{id}-top-stream"),
                "IMGbottomAnalytics": format!("{id}-footer-stream"),
                "screen_width": 8,
                "screen_height": 8,
                "ad_width": 8,
                "ad_height": 4,
                "screen_footer_width": 8,
                "screen_footer_height": 2
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}
