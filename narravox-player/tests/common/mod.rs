//! Shared test doubles for integration tests
//!
//! An in-memory synthesis backend with configurable per-segment delays and
//! failures, and an audio output that records what it plays and finishes
//! clips on a timer. Designed for paused tokio time.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use narravox_common::events::NarrationEvent;
use narravox_common::voice::{AudioVariant, VoiceRegistry, DEFAULT_VARIANT, NARRATOR_VOICE_ID};
use narravox_player::error::{Error, Result};
use narravox_player::playback::output::{AudioHandle, AudioOutput};
use narravox_player::playback::scheduler::SharedVoices;
use narravox_player::synth::client::SpeechBackend;
use narravox_player::synth::resolver::SynthesisRequest;
use narravox_player::text::marker::MarkerKind;
use narravox_player::text::segmenter::Segment;

/// Synthesis backend with per-segment delays and failures
pub struct FakeBackend {
    default_delay: Duration,
    delays: Mutex<HashMap<String, Duration>>,
    failures: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            delays: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_delay(&self, text: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(text.to_string(), delay);
    }

    pub fn fail(&self, text: &str) {
        self.failures.lock().unwrap().insert(text.to_string());
    }

    /// Segment texts in dispatch order, padding stripped
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Undo the prosody padding the resolver applies
pub fn inner_text(padded: &str) -> String {
    padded
        .strip_prefix("... ")
        .unwrap_or(padded)
        .strip_suffix(" ...")
        .unwrap_or(padded)
        .to_string()
}

/// The prosody-padded form of a segment text
pub fn padded(text: &str) -> String {
    format!("... {} ...", text)
}

impl SpeechBackend for FakeBackend {
    fn synthesize(&self, request: SynthesisRequest) -> BoxFuture<'static, Result<Vec<u8>>> {
        let key = inner_text(&request.text);
        self.requests.lock().unwrap().push(key.clone());
        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .unwrap_or(self.default_delay);
        let fail = self.failures.lock().unwrap().contains(&key);
        let bytes = request.text.into_bytes();
        async move {
            tokio::time::sleep(delay).await;
            if fail {
                Err(Error::Synthesis {
                    status: 500,
                    body: "synthesis exploded".to_string(),
                })
            } else {
                Ok(bytes)
            }
        }
        .boxed()
    }
}

/// Audio output that records what it plays and finishes clips on a timer
pub struct FakeOutput {
    clip_duration: Duration,
    played: Arc<Mutex<Vec<String>>>,
    stops: Arc<AtomicUsize>,
}

impl FakeOutput {
    pub fn new(clip_duration: Duration) -> Self {
        Self {
            clip_duration,
            played: Arc::new(Mutex::new(Vec::new())),
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Clip contents in playback order (the synthesized request texts)
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AudioOutput for FakeOutput {
    fn play(&self, clip: Vec<u8>) -> Result<(AudioHandle, oneshot::Receiver<Result<()>>)> {
        self.played
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(&clip).to_string());
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let duration = self.clip_duration;
        let stops = self.stops.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = stop_rx => {
                    stops.fetch_add(1, Ordering::SeqCst);
                    let _ = done_tx.send(Ok(()));
                }
                _ = tokio::time::sleep(duration) => {
                    let _ = done_tx.send(Ok(()));
                }
            }
        });
        Ok((AudioHandle::new(stop_tx), done_rx))
    }
}

/// Registry with uploaded samples for the narrator and one character, Bob
pub fn make_voices() -> SharedVoices {
    let mut voices = VoiceRegistry::new();
    voices
        .set_variant(
            NARRATOR_VOICE_ID,
            DEFAULT_VARIANT,
            AudioVariant {
                data: Some(b"narrator-sample".to_vec()),
                file_name: None,
                duration_seconds: None,
            },
        )
        .unwrap();
    voices.add_voice("bob1", "Bob").unwrap();
    voices
        .set_variant(
            "bob1",
            DEFAULT_VARIANT,
            AudioVariant {
                data: Some(b"bob-sample".to_vec()),
                file_name: None,
                duration_seconds: None,
            },
        )
        .unwrap();
    Arc::new(RwLock::new(voices))
}

pub fn seg(kind: MarkerKind, text: &str, conversation_id: Uuid) -> Segment {
    Segment {
        kind,
        character: if kind == MarkerKind::Character {
            "Bob".to_string()
        } else {
            "Narrator".to_string()
        },
        voice_file: "default.mp3".to_string(),
        emotions: BTreeMap::new(),
        text: text.to_string(),
        conversation_id,
    }
}

pub fn narration(texts: &[&str], conversation_id: Uuid) -> Vec<Segment> {
    texts
        .iter()
        .map(|t| seg(MarkerKind::Narrator, t, conversation_id))
        .collect()
}

/// Collect events until the predicate flags a terminal one
pub async fn collect_until(
    rx: &mut broadcast::Receiver<NarrationEvent>,
    terminal: impl Fn(&NarrationEvent) -> bool,
) -> Vec<NarrationEvent> {
    let mut events = Vec::new();
    let deadline = Duration::from_secs(3600);
    loop {
        let event = tokio::time::timeout(deadline, rx.recv())
            .await
            .expect("timed out waiting for terminal event")
            .expect("event bus closed");
        let stop = terminal(&event);
        events.push(event);
        if stop {
            return events;
        }
    }
}

pub fn is_completed(event: &NarrationEvent) -> bool {
    matches!(event, NarrationEvent::QueueCompleted { .. })
}
