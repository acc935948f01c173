//! Core data structures: slots, image references and schedules
//!
//! A [`Schedule`] is validated once on construction (and again whenever it is
//! deserialized from persistent storage) and is never mutated afterwards. A
//! refresh always produces a brand-new `Schedule`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::clock::{format_millis, EpochMillis};

/// Validation failures for an assembled schedule
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// No slots at all
    #[error("Schedule has no slots")]
    Empty,

    /// One slot only; its duration cannot be derived
    #[error("Schedule has a single slot; its duration is undefined")]
    SingleSlot,

    /// Start times go backwards at `index`
    #[error("Slot {index} starts before the slot preceding it")]
    Unordered { index: usize },

    /// Slot times too far apart to derive durations and an end time
    #[error("Slot {index} time is out of range; the schedule end overflows")]
    TimeOverflow { index: usize },
}

/// Reference to a remote image decoded at an exact target size
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl ImageRef {
    pub fn new(url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            url: url.into(),
            width,
            height,
        }
    }

    /// A reference can only be fetched when it has a url and a non-zero size
    pub fn is_complete(&self) -> bool {
        !self.url.trim().is_empty() && self.width > 0 && self.height > 0
    }
}

/// Which ad surface an image belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdPosition {
    Top,
    Bottom,
}

impl AdPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }
}

/// Analytics attribution carried by a slot, opaque to scheduling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub top_advertiser_id: String,
    pub footer_advertiser_id: String,
    pub device_id: String,
    /// Analytics stream of the top image
    #[serde(default)]
    pub top_stream_id: String,
    /// Analytics stream of the footer image
    #[serde(default)]
    pub footer_stream_id: String,
}

/// One displayable unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    /// Instant the slot becomes active
    pub start_time: EpochMillis,
    pub top_image: ImageRef,
    pub footer_image: ImageRef,
    pub attribution: Attribution,
}

impl Slot {
    /// Image reference for an ad position
    pub fn image(&self, position: AdPosition) -> &ImageRef {
        match position {
            AdPosition::Top => &self.top_image,
            AdPosition::Bottom => &self.footer_image,
        }
    }

    /// Advertiser shown at an ad position
    pub fn advertiser_id(&self, position: AdPosition) -> &str {
        match position {
            AdPosition::Top => &self.attribution.top_advertiser_id,
            AdPosition::Bottom => &self.attribution.footer_advertiser_id,
        }
    }
}

/// Screen and image geometry, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub screen_width: u32,
    pub screen_height: u32,
    pub ad_width: u32,
    pub ad_height: u32,
    pub footer_width: u32,
    pub footer_height: u32,
}

/// Where `now` falls relative to a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLocation {
    /// Before the first slot begins
    BeforeStart,
    /// Inside the window of the slot at this index
    Active(usize),
    /// At or past the schedule end time
    Expired,
}

/// Serialized shape of a schedule; validated on the way in
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScheduleRecord {
    screen_id: String,
    geometry: ScreenGeometry,
    slots: Vec<Slot>,
}

/// Ordered slots plus screen geometry for one screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScheduleRecord", into = "ScheduleRecord")]
pub struct Schedule {
    screen_id: String,
    geometry: ScreenGeometry,
    slots: Vec<Slot>,
}

impl TryFrom<ScheduleRecord> for Schedule {
    type Error = ScheduleError;

    fn try_from(record: ScheduleRecord) -> Result<Self, Self::Error> {
        Schedule::new(record.screen_id, record.geometry, record.slots)
    }
}

impl From<Schedule> for ScheduleRecord {
    fn from(schedule: Schedule) -> Self {
        Self {
            screen_id: schedule.screen_id,
            geometry: schedule.geometry,
            slots: schedule.slots,
        }
    }
}

impl Schedule {
    /// Assemble and validate a schedule
    ///
    /// Requires at least two slots with non-decreasing start times and an end
    /// time that fits in an `i64`. Slots are kept in the given order.
    pub fn new(
        screen_id: impl Into<String>,
        geometry: ScreenGeometry,
        slots: Vec<Slot>,
    ) -> Result<Self, ScheduleError> {
        match slots.len() {
            0 => return Err(ScheduleError::Empty),
            1 => return Err(ScheduleError::SingleSlot),
            _ => {}
        }

        if let Some(index) = slots
            .windows(2)
            .position(|pair| pair[1].start_time < pair[0].start_time)
        {
            return Err(ScheduleError::Unordered { index: index + 1 });
        }

        // Every duration and the end time must be representable
        if let Some(index) = slots
            .windows(2)
            .position(|pair| pair[1].start_time.checked_sub(pair[0].start_time).is_none())
        {
            return Err(ScheduleError::TimeOverflow { index: index + 1 });
        }
        let last = slots.len() - 1;
        let end = slots[last]
            .start_time
            .checked_sub(slots[last - 1].start_time)
            .and_then(|duration| slots[last].start_time.checked_add(duration));
        if end.is_none() {
            return Err(ScheduleError::TimeOverflow { index: last });
        }

        Ok(Self {
            screen_id: screen_id.into(),
            geometry,
            slots,
        })
    }

    pub fn screen_id(&self) -> &str {
        &self.screen_id
    }

    pub fn geometry(&self) -> ScreenGeometry {
        self.geometry
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false for a constructed schedule
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Start of the first slot
    pub fn date(&self) -> EpochMillis {
        self.slots[0].start_time
    }

    /// Duration of the slot at `index` in milliseconds
    ///
    /// The last slot has no authoritative end, so it reuses the previous
    /// slot's duration.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn slot_duration(&self, index: usize) -> i64 {
        let last = self.slots.len() - 1;
        assert!(index <= last, "slot index {index} out of range");

        if index == last {
            self.slots[last].start_time - self.slots[last - 1].start_time
        } else {
            self.slots[index + 1].start_time - self.slots[index].start_time
        }
    }

    /// Instant at which the slot at `index` ends
    pub fn slot_end(&self, index: usize) -> EpochMillis {
        self.slots[index].start_time + self.slot_duration(index)
    }

    /// Instant at which the whole schedule ends
    pub fn end_time(&self) -> EpochMillis {
        self.slot_end(self.slots.len() - 1)
    }

    pub fn is_expired_at(&self, now: EpochMillis) -> bool {
        now >= self.end_time()
    }

    /// Locate `now` within the schedule
    ///
    /// Binary search over the sorted start times. The active slot is the
    /// unique `i` with `start(i) <= now < start(i) + duration(i)`; zero-length
    /// windows never match.
    pub fn locate(&self, now: EpochMillis) -> SlotLocation {
        if self.is_expired_at(now) {
            return SlotLocation::Expired;
        }

        match self.slots.partition_point(|slot| slot.start_time <= now) {
            0 => SlotLocation::BeforeStart,
            started => SlotLocation::Active(started - 1),
        }
    }

    /// Time left in the slot at `index` as seen from `now`, floored at zero
    ///
    /// Equals `duration(index) - (now - start(index))`, so any lateness in
    /// reaching the slot is subtracted instead of accumulating.
    pub fn remaining_in_slot(&self, index: usize, now: EpochMillis) -> Duration {
        let elapsed = now - self.slots[index].start_time;
        let remaining = self.slot_duration(index) - elapsed;
        Duration::from_millis(remaining.max(0) as u64)
    }

    /// Summary for display
    pub fn summary(&self, now: EpochMillis) -> ScheduleSummary {
        ScheduleSummary {
            screen_id: self.screen_id.clone(),
            total_slots: self.slots.len(),
            starts_at: self.date(),
            ends_at: self.end_time(),
            location: self.locate(now),
        }
    }
}

/// Schedule summary statistics
#[derive(Debug, Clone)]
pub struct ScheduleSummary {
    pub screen_id: String,
    pub total_slots: usize,
    pub starts_at: EpochMillis,
    pub ends_at: EpochMillis,
    pub location: SlotLocation,
}

impl ScheduleSummary {
    /// Format as display string
    pub fn display(&self) -> String {
        let mut output = format!("Schedule for screen {}\n", self.screen_id);
        output.push_str(&format!("{:-<40}\n", ""));
        output.push_str(&format!("Slots: {}\n", self.total_slots));
        output.push_str(&format!("Starts: {}\n", format_millis(self.starts_at)));
        output.push_str(&format!("Ends: {}\n", format_millis(self.ends_at)));

        let state = match self.location {
            SlotLocation::BeforeStart => "not started".to_string(),
            SlotLocation::Active(index) => format!("slot {} of {}", index + 1, self.total_slots),
            SlotLocation::Expired => "expired".to_string(),
        };
        output.push_str(&format!("Now: {state}\n"));

        output
    }
}
