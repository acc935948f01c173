//! End-to-end tests for the player loop
//!
//! Time is paused, so transition timers, retry cooldowns and the wall clock
//! advance together without real waiting.

mod common;

use common::{create_test_schedule, schedule_document, CountingDecoder, RecordingDisplay, ScriptedTransport, Shown, TokioClock};
use slotcast::analytics::ChannelEventSink;
use slotcast::config::Config;
use slotcast::models::AdPosition;
use slotcast::player::{Player, PlayerParts};
use slotcast::storage::{MemoryStore, ScheduleStore};
use std::sync::Arc;
use std::time::Duration;

struct Rig {
    transport: Arc<ScriptedTransport>,
    blobs: Arc<MemoryStore>,
    decoder: Arc<CountingDecoder>,
    display: Arc<RecordingDisplay>,
    events: tokio::sync::mpsc::UnboundedReceiver<slotcast::analytics::SlotTransitionEvent>,
    player: Player,
}

fn rig(config: &Config, now: i64, responses: Vec<Result<String, slotcast::fetcher::TransportError>>) -> Rig {
    let transport = Arc::new(ScriptedTransport::new(responses));
    let blobs = Arc::new(MemoryStore::new());
    let decoder = Arc::new(CountingDecoder::default());
    let display = Arc::new(RecordingDisplay::default());
    let (sink, events) = ChannelEventSink::new();

    let player = Player::new(
        config,
        PlayerParts {
            transport: transport.clone(),
            blobs: blobs.clone(),
            decoder: decoder.clone(),
            sink: Arc::new(sink),
            display: display.clone(),
            clock: Arc::new(TokioClock::starting_at(now)),
        },
    )
    .unwrap();

    Rig {
        transport,
        blobs,
        decoder,
        display,
        events,
        player,
    }
}

fn screen_config() -> Config {
    let mut config = Config::default();
    config.source.screen_id = "screen-1".to_string();
    config
}

#[tokio::test(start_paused = true)]
async fn test_plays_schedule_then_fetches_next() {
    let mut rig = rig(
        &screen_config(),
        500,
        vec![
            Ok(schedule_document("a", &[0, 1000, 2000])),
            Ok(schedule_document("b", &[3000, 4000, 5000])),
        ],
    );

    rig.player.start().await.unwrap();
    for _ in 0..3 {
        rig.player.step().await.unwrap();
    }

    assert_eq!(rig.display.shown_ids(), vec!["a0", "a1", "a2", "b0"]);
    assert!(rig
        .display
        .shown()
        .iter()
        .all(|shown| shown.top && shown.footer));
    assert_eq!(rig.transport.calls(), 2);
    assert_eq!(rig.player.scheduler().current_index(), Some(0));

    let mut events = Vec::new();
    while let Ok(event) = rig.events.try_recv() {
        events.push((event.slot_id, event.ad_position));
    }
    assert_eq!(events.len(), 8);
    assert_eq!(events[0], ("a0".to_string(), AdPosition::Top));
    assert_eq!(events[1], ("a0".to_string(), AdPosition::Bottom));
    assert_eq!(events[7], ("b0".to_string(), AdPosition::Bottom));

    // The new schedule was persisted
    let store = ScheduleStore::new(rig.blobs.clone());
    let persisted = store.load().await.unwrap().unwrap();
    assert_eq!(persisted.slot(0).unwrap().id, "b0");
}

#[tokio::test(start_paused = true)]
async fn test_resumes_persisted_schedule_without_fetching() {
    let mut rig = rig(&screen_config(), 1500, vec![]);
    ScheduleStore::new(rig.blobs.clone())
        .save(&create_test_schedule(&[0, 1000, 2000]))
        .await
        .unwrap();

    rig.player.start().await.unwrap();

    assert_eq!(rig.transport.calls(), 0);
    assert_eq!(
        rig.display.shown(),
        vec![Shown {
            slot_id: "s1".to_string(),
            top: true,
            footer: true,
        }]
    );
    assert_eq!(rig.player.scheduler().armed_delay(), Some(Duration::from_millis(500)));
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_attempt_cap() {
    let mut config = screen_config();
    config.retry.max_attempts = Some(2);
    let mut rig = rig(&config, 500, vec![]);

    let started = tokio::time::Instant::now();
    let err = rig.player.start().await.unwrap_err();

    assert!(err.is_unrecoverable_schedule());
    assert_eq!(rig.display.unrecoverable_count(), 1);
    assert_eq!(rig.transport.calls(), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
    assert!(rig.display.shown().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_image_still_shows_slot() {
    let mut rig = rig(
        &screen_config(),
        500,
        vec![Ok(schedule_document("a", &[0, 1000, 2000]))],
    );
    rig.decoder.fail("https://cdn.test/a0/footer.png");

    rig.player.start().await.unwrap();

    assert_eq!(
        rig.display.shown(),
        vec![Shown {
            slot_id: "a0".to_string(),
            top: true,
            footer: false,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_run_until_stops_on_shutdown() {
    let mut rig = rig(
        &screen_config(),
        500,
        vec![Ok(schedule_document("a", &[0, 1000, 2000]))],
    );

    rig.player
        .run_until(tokio::time::sleep(Duration::from_millis(1200)))
        .await
        .unwrap();

    assert_eq!(rig.display.shown_ids(), vec!["a0", "a1"]);
    assert!(!rig.player.scheduler().is_active());
    assert_eq!(rig.player.scheduler().armed_delay(), None);
}
