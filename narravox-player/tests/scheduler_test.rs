//! Playback scheduler integration tests
//!
//! Drives the scheduler with an in-memory synthesis backend and audio
//! output under paused tokio time, so preload completion order, gaps, and
//! skip delays are fully deterministic.

mod common;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use common::{
    collect_until, is_completed, make_voices, narration, padded, seg, FakeBackend, FakeOutput,
};
use narravox_common::events::{EventBus, NarrationEvent, SkipReason};
use narravox_common::settings::{ActionHandling, Settings, SettingsStore};
use narravox_player::playback::scheduler::PlaybackScheduler;
use narravox_player::playback::SchedulerState;
use narravox_player::synth::client::HttpSpeechBackend;
use narravox_player::text::marker::MarkerKind;

struct Harness {
    scheduler: PlaybackScheduler,
    backend: Arc<FakeBackend>,
    output: Arc<FakeOutput>,
    events: EventBus,
}

fn harness(configure: impl FnOnce(&mut Settings)) -> Harness {
    let events = EventBus::new(1024);
    let mut settings = Settings::default();
    settings.enabled = true;
    configure(&mut settings);
    let store = SettingsStore::new(settings, events.clone());

    let backend = Arc::new(FakeBackend::new(Duration::from_millis(10)));
    let output = Arc::new(FakeOutput::new(Duration::from_millis(100)));
    let scheduler = PlaybackScheduler::new(
        store,
        make_voices(),
        backend.clone(),
        output.clone(),
        events.clone(),
    );
    Harness {
        scheduler,
        backend,
        output,
        events,
    }
}

#[tokio::test(start_paused = true)]
async fn plays_strictly_in_order_regardless_of_preload_completion_order() {
    let h = harness(|_| {});
    let conv = Uuid::new_v4();
    let mut rx = h.events.subscribe();

    // later segments finish their fetches long before earlier ones
    h.backend.set_delay("seg0", Duration::from_millis(300));
    h.backend.set_delay("seg1", Duration::from_millis(10));
    h.backend.set_delay("seg2", Duration::from_millis(200));
    h.backend.set_delay("seg3", Duration::from_millis(5));

    h.scheduler.set_conversation(conv);
    h.scheduler
        .enqueue(narration(&["seg0", "seg1", "seg2", "seg3"], conv));

    collect_until(&mut rx, is_completed).await;

    assert_eq!(
        h.output.played(),
        vec![padded("seg0"), padded("seg1"), padded("seg2"), padded("seg3")]
    );

    // every segment was fetched exactly once
    let requests = h.backend.requests();
    assert_eq!(requests.len(), 4);
    for text in ["seg0", "seg1", "seg2", "seg3"] {
        assert_eq!(requests.iter().filter(|r| *r == text).count(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn preload_window_is_bounded_and_never_rerequests() {
    let h = harness(|_| {});
    let conv = Uuid::new_v4();

    // the playhead fetch never completes during the observation window
    h.backend.set_delay("seg0", Duration::from_secs(600));
    for i in 1..10 {
        h.backend
            .set_delay(&format!("seg{}", i), Duration::from_secs(300));
    }

    let texts: Vec<String> = (0..10).map(|i| format!("seg{}", i)).collect();
    let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
    h.scheduler.set_conversation(conv);
    h.scheduler.enqueue(narration(&refs, conv));

    tokio::time::sleep(Duration::from_millis(50)).await;

    // playhead fetch plus exactly max_preload (5) lookahead fetches
    let requests = h.backend.requests();
    assert_eq!(requests.len(), 6);
    for i in 0..6 {
        assert!(requests.contains(&format!("seg{}", i)), "missing seg{}", i);
    }
    assert!(!requests.contains(&"seg6".to_string()));
    assert!(!requests.contains(&"seg9".to_string()));

    // policy re-runs do not duplicate in-flight fetches
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.backend.requests().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn preload_window_slides_with_playhead_and_clips_at_queue_end() {
    let h = harness(|_| {});
    let conv = Uuid::new_v4();

    // segment 2's fetch hangs, freezing the playhead at index 2
    h.backend.set_delay("seg2", Duration::from_secs(600));

    let texts: Vec<String> = (0..10).map(|i| format!("seg{}", i)).collect();
    let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
    h.scheduler.set_conversation(conv);
    h.scheduler.enqueue(narration(&refs, conv));

    // long enough for seg0 and seg1 to play out, far less than seg2's fetch
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(h.output.played(), vec![padded("seg0"), padded("seg1")]);

    // windows seen so far: {1..5}, {2..6}, {3..7} — union with the played
    // fetches is exactly segments 0..=7, each once
    let requests = h.backend.requests();
    assert_eq!(requests.len(), 8);
    for i in 0..8 {
        assert_eq!(
            requests.iter().filter(|r| **r == format!("seg{}", i)).count(),
            1,
            "seg{} fetched wrong number of times",
            i
        );
    }
    assert!(!requests.contains(&"seg8".to_string()));
    assert!(!requests.contains(&"seg9".to_string()));
}

#[tokio::test(start_paused = true)]
async fn stale_conversation_segments_are_skipped_not_played() {
    let h = harness(|_| {});
    let stale = Uuid::new_v4();
    let active = Uuid::new_v4();
    let mut rx = h.events.subscribe();

    h.scheduler.set_conversation(active);
    h.scheduler.enqueue(narration(&["a", "b", "c"], stale));

    let events = collect_until(&mut rx, is_completed).await;

    let skips: Vec<&NarrationEvent> = events
        .iter()
        .filter(|e| matches!(e, NarrationEvent::SegmentSkipped { .. }))
        .collect();
    assert_eq!(skips.len(), 3);
    for (i, event) in skips.iter().enumerate() {
        match event {
            NarrationEvent::SegmentSkipped { index, reason, .. } => {
                assert_eq!(*index, i);
                assert_eq!(*reason, SkipReason::StaleConversation);
            }
            _ => unreachable!(),
        }
    }

    assert!(h.output.played().is_empty());
    // stale segments are never fetched, not even speculatively
    assert!(h.backend.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disable_narrator_skips_narrator_segments_only() {
    let h = harness(|s| s.disable_narrator = true);
    let conv = Uuid::new_v4();
    let mut rx = h.events.subscribe();

    h.scheduler.set_conversation(conv);
    h.scheduler.enqueue(vec![
        seg(MarkerKind::Narrator, "scene", conv),
        seg(MarkerKind::Character, "line", conv),
        seg(MarkerKind::Action, "gesture", conv),
    ]);

    let events = collect_until(&mut rx, is_completed).await;

    assert_eq!(h.output.played(), vec![padded("line"), padded("gesture")]);
    assert!(events.iter().any(|e| matches!(
        e,
        NarrationEvent::SegmentSkipped {
            index: 0,
            reason: SkipReason::NarratorDisabled,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn silence_actions_skips_action_segments() {
    let h = harness(|s| s.action_handling = ActionHandling::Silence);
    let conv = Uuid::new_v4();
    let mut rx = h.events.subscribe();

    h.scheduler.set_conversation(conv);
    h.scheduler.enqueue(vec![
        seg(MarkerKind::Action, "gesture", conv),
        seg(MarkerKind::Character, "line", conv),
        seg(MarkerKind::Narrator, "scene", conv),
    ]);

    let events = collect_until(&mut rx, is_completed).await;

    assert_eq!(h.output.played(), vec![padded("line"), padded("scene")]);
    assert!(events.iter().any(|e| matches!(
        e,
        NarrationEvent::SegmentSkipped {
            index: 0,
            reason: SkipReason::ActionSilenced,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn forced_reset_stops_audio_and_returns_to_idle() {
    let h = harness(|_| {});
    let conv = Uuid::new_v4();
    let mut rx = h.events.subscribe();

    h.scheduler.set_conversation(conv);
    h.scheduler.enqueue(narration(&["long0", "long1", "long2"], conv));

    // let the first segment get audibly going
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.output.played(), vec![padded("long0")]);

    h.scheduler.reset(true);
    collect_until(&mut rx, |e| {
        matches!(e, NarrationEvent::QueueReset { forced: true, .. })
    })
    .await;

    assert_eq!(h.scheduler.state(), SchedulerState::Idle);
    // give the output's stop path a beat to run
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(h.output.stop_count(), 1);

    // nothing from the old queue plays after the reset
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.output.played(), vec![padded("long0")]);

    // the scheduler accepts new work afterwards
    h.scheduler.enqueue(narration(&["fresh"], conv));
    collect_until(&mut rx, is_completed).await;
    assert_eq!(h.output.played(), vec![padded("long0"), padded("fresh")]);
}

#[tokio::test(start_paused = true)]
async fn non_forced_reset_is_noop_while_preserve_flag_set() {
    let h = harness(|_| {});
    let conv = Uuid::new_v4();
    let mut rx = h.events.subscribe();

    h.scheduler.set_preserve_queue(true);
    h.scheduler.set_conversation(conv);
    h.scheduler.enqueue(narration(&["a", "b"], conv));
    h.scheduler.reset(false);

    // playback continues to completion despite the reset
    let events = collect_until(&mut rx, is_completed).await;
    assert!(!events
        .iter()
        .any(|e| matches!(e, NarrationEvent::QueueReset { .. })));
    assert_eq!(h.output.played(), vec![padded("a"), padded("b")]);

    // a forced reset still goes through
    h.scheduler.enqueue(narration(&["c"], conv));
    h.scheduler.reset(true);
    collect_until(&mut rx, |e| {
        matches!(e, NarrationEvent::QueueReset { forced: true, .. })
    })
    .await;
    assert_eq!(h.scheduler.state(), SchedulerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_skips_segment_and_playback_continues() {
    let h = harness(|_| {});
    let conv = Uuid::new_v4();
    let mut rx = h.events.subscribe();

    h.backend.fail("seg1");

    h.scheduler.set_conversation(conv);
    h.scheduler.enqueue(narration(&["seg0", "seg1", "seg2"], conv));

    let events = collect_until(&mut rx, is_completed).await;

    assert_eq!(h.output.played(), vec![padded("seg0"), padded("seg2")]);
    assert!(events
        .iter()
        .any(|e| matches!(e, NarrationEvent::SegmentFailed { index: 1, .. })));
}

#[tokio::test(start_paused = true)]
async fn missing_api_key_aborts_whole_queue() {
    let events = EventBus::new(1024);
    let mut settings = Settings::default();
    settings.enabled = true;
    settings.use_local_api = false;
    settings.api_key = String::new();
    let store = SettingsStore::new(settings, events.clone());

    let backend = Arc::new(HttpSpeechBackend::new(store.clone()).unwrap());
    let output = Arc::new(FakeOutput::new(Duration::from_millis(100)));
    let scheduler = PlaybackScheduler::new(
        store,
        make_voices(),
        backend,
        output.clone(),
        events.clone(),
    );

    let conv = Uuid::new_v4();
    let mut rx = events.subscribe();
    scheduler.set_conversation(conv);
    scheduler.enqueue(narration(&["a", "b", "c"], conv));

    let seen = collect_until(&mut rx, |e| {
        matches!(e, NarrationEvent::QueueReset { forced: true, .. })
    })
    .await;

    assert!(seen
        .iter()
        .any(|e| matches!(e, NarrationEvent::QueueAborted { .. })));
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert!(output.played().is_empty());
}

#[tokio::test(start_paused = true)]
async fn completed_segments_never_replay_on_later_enqueue() {
    let h = harness(|_| {});
    let conv = Uuid::new_v4();
    let mut rx = h.events.subscribe();

    h.scheduler.set_conversation(conv);
    h.scheduler.enqueue(narration(&["one", "two"], conv));
    collect_until(&mut rx, is_completed).await;

    h.scheduler.enqueue(narration(&["three", "four"], conv));
    collect_until(&mut rx, is_completed).await;

    assert_eq!(
        h.output.played(),
        vec![padded("one"), padded("two"), padded("three"), padded("four")]
    );
}

#[tokio::test(start_paused = true)]
async fn wait_until_idle_resolves_after_queue_drains() {
    let h = harness(|_| {});
    let conv = Uuid::new_v4();

    h.scheduler.set_conversation(conv);
    h.scheduler.enqueue(narration(&["only"], conv));
    h.scheduler.wait_until_idle().await;

    assert_eq!(h.scheduler.state(), SchedulerState::Idle);
    assert_eq!(h.output.played(), vec![padded("only")]);
}
