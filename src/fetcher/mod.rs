//! Schedule fetching and normalization
//!
//! [`ScheduleFetcher`] pulls the raw document through a
//! [`ScheduleTransport`], maps every raw item to a [`Slot`] and assembles a
//! [`Schedule`]. A fetch either yields a complete, valid, unexpired schedule
//! or an error; a partial schedule is never returned.
//!
//! Slot times arrive as hexadecimal seconds since the epoch and are converted
//! to milliseconds. A single unparseable time rejects the whole document with
//! [`FetchError::MalformedTimestamp`]; a well-formed document whose window has
//! already elapsed is rejected with [`FetchError::AlreadyExpired`].

pub mod document;
pub mod transport;

use std::sync::Arc;
use thiserror::Error;

use crate::clock::{format_millis, Clock, EpochMillis};
use crate::models::{Attribution, ImageRef, Schedule, ScheduleError, ScreenGeometry, Slot};

pub use document::RawItem;
pub use transport::{HttpTransport, ScheduleTransport, TransportError};

/// Errors that can occur while fetching a schedule
#[derive(Error, Debug)]
pub enum FetchError {
    /// The schedule source could not be reached
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The body is not a schedule document
    #[error("Malformed schedule document: {0}")]
    MalformedDocument(#[from] serde_json::Error),

    /// A slot time is not a hexadecimal number of seconds
    #[error("Malformed timestamp {raw:?} for slot '{slot_id}'")]
    MalformedTimestamp { slot_id: String, raw: String },

    /// The assembled slots do not form a valid schedule
    #[error("Invalid schedule: {0}")]
    Invalid(#[from] ScheduleError),

    /// Every slot of the schedule has already elapsed
    #[error("Schedule already expired at {}", format_millis(*.end_time))]
    AlreadyExpired { end_time: EpochMillis },
}

impl FetchError {
    /// Whether the failure came from the network rather than the content
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Parse a hexadecimal seconds value into epoch milliseconds
///
/// Accepts surrounding whitespace and an optional `0x` prefix. Every other
/// character must be a hex digit. Returns `None` for anything else, including
/// values that overflow once scaled to milliseconds.
pub fn parse_hex_timestamp(raw: &str) -> Option<EpochMillis> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let seconds = i64::from_str_radix(digits, 16).ok()?;
    seconds.checked_mul(1000)
}

/// Map raw items to a schedule for `screen_id`
///
/// Geometry is taken from the first item. Image references get the ad
/// dimensions for the top image and the footer dimensions for the footer.
pub fn normalize(items: Vec<RawItem>, screen_id: &str) -> Result<Schedule, FetchError> {
    let Some(first) = items.first() else {
        return Err(ScheduleError::Empty.into());
    };

    let geometry = ScreenGeometry {
        screen_width: first.screen_width.unwrap_or_default(),
        screen_height: first.screen_height.unwrap_or_default(),
        ad_width: first.ad_width.unwrap_or_default(),
        ad_height: first.ad_height.unwrap_or_default(),
        footer_width: first.screen_footer_width.unwrap_or_default(),
        footer_height: first.screen_footer_height.unwrap_or_default(),
    };

    let slots = items
        .into_iter()
        .map(|item| {
            let start_time = parse_hex_timestamp(&item.ad_time).ok_or_else(|| {
                FetchError::MalformedTimestamp {
                    slot_id: item.slot_id.clone(),
                    raw: item.ad_time.clone(),
                }
            })?;

            Ok(Slot {
                id: item.slot_id,
                start_time,
                top_image: ImageRef::new(item.image_top, geometry.ad_width, geometry.ad_height),
                footer_image: ImageRef::new(
                    item.image_bottom,
                    geometry.footer_width,
                    geometry.footer_height,
                ),
                attribution: Attribution {
                    top_advertiser_id: item.advertiser_top,
                    footer_advertiser_id: item.advertiser_bottom,
                    device_id: item.device_id,
                    top_stream_id: item.analytics_top,
                    footer_stream_id: item.analytics_bottom,
                },
            })
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    Ok(Schedule::new(screen_id, geometry, slots)?)
}

/// Fetches and validates schedules for one screen
pub struct ScheduleFetcher {
    transport: Arc<dyn ScheduleTransport>,
    clock: Arc<dyn Clock>,
    screen_id: String,
}

impl ScheduleFetcher {
    pub fn new(
        transport: Arc<dyn ScheduleTransport>,
        clock: Arc<dyn Clock>,
        screen_id: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            clock,
            screen_id: screen_id.into(),
        }
    }

    pub fn screen_id(&self) -> &str {
        &self.screen_id
    }

    /// Fetch, normalize and validate the current schedule
    ///
    /// # Errors
    ///
    /// - `FetchError::Transport` when the source cannot be reached
    /// - `FetchError::MalformedDocument` / `FetchError::Invalid` for bodies
    ///   that are not a usable schedule
    /// - `FetchError::MalformedTimestamp` when any slot time does not parse
    /// - `FetchError::AlreadyExpired` when the schedule ended before now
    pub async fn fetch(&self) -> Result<Schedule, FetchError> {
        let body = self.transport.fetch(&self.screen_id).await?;
        let items = document::parse_items(&body)?;
        let schedule = normalize(items, &self.screen_id)?;

        let now = self.clock.now_millis();
        if schedule.is_expired_at(now) {
            return Err(FetchError::AlreadyExpired {
                end_time: schedule.end_time(),
            });
        }

        tracing::info!(
            screen_id = %self.screen_id,
            slots = schedule.len(),
            starts_at = %format_millis(schedule.date()),
            ends_at = %format_millis(schedule.end_time()),
            "Fetched schedule"
        );

        Ok(schedule)
    }
}
