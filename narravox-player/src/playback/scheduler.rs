//! Playback scheduler
//!
//! A single task owns all mutable playback state: the segment queue, the
//! playhead, the preloaded-audio map, the loading set, and the active
//! conversation. Everything else talks to it through commands; synthesis
//! fetches and audio completions come back as commands too, so state is
//! only ever touched from one place.
//!
//! Ordering guarantee: playback strictly follows queue index order
//! regardless of which preload fetches complete first. A later segment
//! finishing its fetch early is parked in the preloaded map; the scheduler
//! only consumes the entry matching the current playhead.
//!
//! Stale completions (from before a reset) are discarded by a generation
//! counter; in-flight synthesis requests are not cancelled at the transport
//! level, their completions just become no-ops.

use crate::error::{Error, Result};
use crate::playback::output::{AudioHandle, AudioOutput};
use crate::playback::types::{PreloadedAudio, SchedulerState};
use crate::synth::client::SpeechBackend;
use crate::synth::resolver::build_request;
use crate::text::marker::MarkerKind;
use crate::text::segmenter::Segment;
use chrono::Utc;
use narravox_common::events::{EventBus, NarrationEvent, SkipReason};
use narravox_common::settings::{ActionHandling, SettingsStore};
use narravox_common::voice::VoiceRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Shared voice registry handle
pub type SharedVoices = Arc<RwLock<VoiceRegistry>>;

/// Delay before advancing past a skipped segment
const SKIP_DELAY: Duration = Duration::from_millis(100);

/// Delay before advancing past a failed segment
const RETRY_DELAY: Duration = Duration::from_millis(100);

enum Command {
    Enqueue {
        segments: Vec<Segment>,
    },
    Reset {
        force: bool,
    },
    SetConversation {
        conversation_id: uuid::Uuid,
    },
    SetPreserveQueue {
        preserve: bool,
    },
    FetchDone {
        index: usize,
        generation: u64,
        result: Result<Vec<u8>>,
    },
    PlaybackDone {
        index: usize,
        generation: u64,
        result: Result<()>,
    },
    AdvanceTick {
        index: usize,
        generation: u64,
    },
}

/// Handle to the scheduler task
#[derive(Clone)]
pub struct PlaybackScheduler {
    tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<SchedulerState>,
}

impl PlaybackScheduler {
    /// Spawn the scheduler task
    pub fn new(
        settings: SettingsStore,
        voices: SharedVoices,
        backend: Arc<dyn SpeechBackend>,
        output: Arc<dyn AudioOutput>,
        events: EventBus,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);

        let task = SchedulerTask {
            tx: tx.clone(),
            state_tx,
            settings,
            voices,
            backend,
            output,
            events,
            queue: Vec::new(),
            playhead: 0,
            state: SchedulerState::Idle,
            preloaded: HashMap::new(),
            loading: HashSet::new(),
            waiting_on_fetch: None,
            current_audio: None,
            active_conversation: None,
            preserve_queue: false,
            generation: 0,
        };
        tokio::spawn(task.run(rx));

        Self { tx, state_rx }
    }

    /// Append segments; if idle, playback starts at the front of the new
    /// batch
    pub fn enqueue(&self, segments: Vec<Segment>) {
        let _ = self.tx.send(Command::Enqueue { segments });
    }

    /// Halt playback, discard preloaded audio, clear the queue
    ///
    /// A non-forced reset is a no-op while the preserve-queue flag is set.
    pub fn reset(&self, force: bool) {
        let _ = self.tx.send(Command::Reset { force });
    }

    /// Set the active conversation; queued segments from other
    /// conversations are skipped, never played
    pub fn set_conversation(&self, conversation_id: uuid::Uuid) {
        let _ = self.tx.send(Command::SetConversation { conversation_id });
    }

    /// Control whether non-forced resets preserve the queue
    pub fn set_preserve_queue(&self, preserve: bool) {
        let _ = self.tx.send(Command::SetPreserveQueue { preserve });
    }

    /// Current scheduler state
    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    /// Wait for in-flight playback to start and drain
    ///
    /// Only meaningful after an enqueue; resolves once the scheduler
    /// returns to idle (completion, abort, or reset).
    pub async fn wait_until_idle(&self) {
        let mut rx = self.state_rx.clone();
        while *rx.borrow_and_update() == SchedulerState::Idle {
            if rx.changed().await.is_err() {
                return;
            }
        }
        while *rx.borrow_and_update() == SchedulerState::Playing {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

struct SchedulerTask {
    tx: mpsc::UnboundedSender<Command>,
    state_tx: watch::Sender<SchedulerState>,
    settings: SettingsStore,
    voices: SharedVoices,
    backend: Arc<dyn SpeechBackend>,
    output: Arc<dyn AudioOutput>,
    events: EventBus,

    queue: Vec<Segment>,
    playhead: usize,
    state: SchedulerState,
    preloaded: HashMap<usize, PreloadedAudio>,
    loading: HashSet<usize>,
    /// Playhead index whose fetch we are blocked on (its audio plays the
    /// moment the fetch completes, bypassing the preloaded map)
    waiting_on_fetch: Option<usize>,
    current_audio: Option<AudioHandle>,
    active_conversation: Option<uuid::Uuid>,
    preserve_queue: bool,
    /// Bumped on every reset; completions carrying an older generation are
    /// discarded
    generation: u64,
}

impl SchedulerTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Enqueue { segments } => self.handle_enqueue(segments),
                Command::Reset { force } => self.handle_reset(force),
                Command::SetConversation { conversation_id } => {
                    self.active_conversation = Some(conversation_id);
                }
                Command::SetPreserveQueue { preserve } => self.preserve_queue = preserve,
                Command::FetchDone {
                    index,
                    generation,
                    result,
                } => self.handle_fetch_done(index, generation, result),
                Command::PlaybackDone {
                    index,
                    generation,
                    result,
                } => self.handle_playback_done(index, generation, result),
                Command::AdvanceTick { index, generation } => {
                    if generation == self.generation {
                        self.start_segment(index);
                    }
                }
            }
        }
        debug!("Playback scheduler shutting down");
    }

    fn set_state(&mut self, state: SchedulerState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn handle_enqueue(&mut self, segments: Vec<Segment>) {
        if segments.is_empty() {
            return;
        }
        let conversation_id = segments[0].conversation_id;
        self.queue.extend(segments);
        debug!("Enqueued segments; queue length now {}", self.queue.len());

        if self.state == SchedulerState::Idle {
            self.set_state(SchedulerState::Playing);
            self.events.emit_lossy(NarrationEvent::QueueStarted {
                conversation_id,
                queue_len: self.queue.len(),
                timestamp: Utc::now(),
            });
            let index = self.playhead;
            self.start_segment(index);
        } else {
            self.run_preload_policy();
        }
    }

    fn handle_reset(&mut self, force: bool) {
        if !force && self.preserve_queue {
            debug!("Not resetting queue - preserve flag set");
            return;
        }
        info!("Resetting queue and stopping playback");
        self.generation += 1;
        if let Some(mut handle) = self.current_audio.take() {
            handle.stop();
        }
        self.preloaded.clear();
        self.loading.clear();
        self.queue.clear();
        self.playhead = 0;
        self.waiting_on_fetch = None;
        self.set_state(SchedulerState::Idle);
        self.events.emit_lossy(NarrationEvent::QueueReset {
            forced: force,
            timestamp: Utc::now(),
        });
    }

    /// Establish `index` as the playhead and get its audio going: play it
    /// if preloaded, wait if loading, otherwise fetch fresh
    fn start_segment(&mut self, index: usize) {
        if index >= self.queue.len() {
            self.complete_queue();
            return;
        }
        self.playhead = index;

        if let Some(reason) = self.skip_reason(&self.queue[index]) {
            info!("Skipping segment {}/{} ({})", index + 1, self.queue.len(), reason);
            // a preloaded entry for a skipped segment would never be
            // consumed; drop it with the skip
            self.preloaded.remove(&index);
            self.events.emit_lossy(NarrationEvent::SegmentSkipped {
                index,
                reason,
                timestamp: Utc::now(),
            });
            self.schedule_tick(index + 1, SKIP_DELAY);
            self.run_preload_policy();
            return;
        }

        if let Some(preloaded) = self.preloaded.remove(&index) {
            debug!(
                "Playing preloaded audio for segment {}/{}",
                index + 1,
                self.queue.len()
            );
            self.play_now(index, preloaded.audio);
        } else if self.loading.contains(&index) {
            debug!("Waiting for segment {} to finish loading", index + 1);
            self.waiting_on_fetch = Some(index);
        } else {
            self.waiting_on_fetch = Some(index);
            self.begin_fetch(index);
        }
        self.run_preload_policy();
    }

    fn skip_reason(&self, segment: &Segment) -> Option<SkipReason> {
        if let Some(active) = self.active_conversation {
            if segment.conversation_id != active {
                return Some(SkipReason::StaleConversation);
            }
        }
        let settings = self.settings.get();
        if settings.disable_narrator && segment.kind == MarkerKind::Narrator {
            return Some(SkipReason::NarratorDisabled);
        }
        if settings.action_handling == ActionHandling::Silence
            && segment.kind == MarkerKind::Action
        {
            return Some(SkipReason::ActionSilenced);
        }
        None
    }

    /// Resolve and dispatch the synthesis fetch for one segment
    fn begin_fetch(&mut self, index: usize) {
        let segment = self.queue[index].clone();
        let settings = self.settings.get();
        let request = {
            let voices = self.voices.read().expect("voice registry lock poisoned");
            build_request(&segment, &settings, &voices)
        };

        self.loading.insert(index);
        let generation = self.generation;
        let tx = self.tx.clone();
        match request {
            Ok(request) => {
                let fut = self.backend.synthesize(request);
                tokio::spawn(async move {
                    let result = fut.await;
                    let _ = tx.send(Command::FetchDone {
                        index,
                        generation,
                        result,
                    });
                });
            }
            // resolution failures take the same completion path as
            // transport failures
            Err(e) => {
                let _ = tx.send(Command::FetchDone {
                    index,
                    generation,
                    result: Err(e),
                });
            }
        }
    }

    fn handle_fetch_done(&mut self, index: usize, generation: u64, result: Result<Vec<u8>>) {
        if generation != self.generation {
            debug!("Dropping stale fetch completion for segment {}", index + 1);
            return;
        }
        self.loading.remove(&index);
        if index < self.playhead || index >= self.queue.len() {
            debug!(
                "Dropping fetch completion outside the window for segment {}",
                index + 1
            );
            return;
        }

        match result {
            Ok(audio) => {
                if self.waiting_on_fetch == Some(index) {
                    self.waiting_on_fetch = None;
                    self.play_now(index, audio);
                } else {
                    debug!("Preloaded segment {}/{}", index + 1, self.queue.len());
                    self.preloaded.insert(
                        index,
                        PreloadedAudio {
                            queue_index: index,
                            segment: self.queue[index].clone(),
                            audio,
                        },
                    );
                }
                self.run_preload_policy();
            }
            Err(e) => {
                if e.is_fatal_for_queue() {
                    // no further segment can succeed either; abandon the
                    // whole queue
                    warn!("Aborting queue: {}", e);
                    self.events.emit_lossy(NarrationEvent::QueueAborted {
                        reason: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    self.handle_reset(true);
                    return;
                }
                let at_playhead = self.waiting_on_fetch == Some(index);
                self.events.emit_lossy(NarrationEvent::SegmentFailed {
                    index,
                    message: e.to_string(),
                    user_visible: at_playhead,
                    timestamp: Utc::now(),
                });
                if at_playhead {
                    warn!("Segment {} failed to load: {}", index + 1, e);
                    self.waiting_on_fetch = None;
                    self.schedule_tick(index + 1, RETRY_DELAY);
                } else {
                    // the playhead will retry this index with a fresh
                    // fetch when it gets there
                    debug!("Preload for segment {} failed: {}", index + 1, e);
                }
            }
        }
    }

    fn play_now(&mut self, index: usize, audio: Vec<u8>) {
        let character = self.queue[index].character.clone();
        match self.output.play(audio) {
            Ok((handle, done_rx)) => {
                info!(
                    "Playing segment {}/{} ({})",
                    index + 1,
                    self.queue.len(),
                    character
                );
                self.current_audio = Some(handle);
                self.events.emit_lossy(NarrationEvent::SegmentStarted {
                    index,
                    character,
                    timestamp: Utc::now(),
                });
                let tx = self.tx.clone();
                let generation = self.generation;
                tokio::spawn(async move {
                    let result = match done_rx.await {
                        Ok(result) => result,
                        Err(_) => Err(Error::Audio("playback result channel closed".to_string())),
                    };
                    let _ = tx.send(Command::PlaybackDone {
                        index,
                        generation,
                        result,
                    });
                });
            }
            Err(e) => {
                warn!("Failed to start playback for segment {}: {}", index + 1, e);
                self.events.emit_lossy(NarrationEvent::SegmentFailed {
                    index,
                    message: e.to_string(),
                    user_visible: true,
                    timestamp: Utc::now(),
                });
                self.schedule_tick(index + 1, RETRY_DELAY);
            }
        }
    }

    fn handle_playback_done(&mut self, index: usize, generation: u64, result: Result<()>) {
        if generation != self.generation {
            return;
        }
        self.current_audio = None;

        let delay = match result {
            Ok(()) => {
                debug!(
                    "Finished playing segment {}/{}",
                    index + 1,
                    self.queue.len()
                );
                self.events.emit_lossy(NarrationEvent::SegmentFinished {
                    index,
                    timestamp: Utc::now(),
                });
                Duration::from_secs_f32(self.settings.get().segment_gap.max(0.0))
            }
            Err(e) => {
                warn!("Playback error on segment {}: {}", index + 1, e);
                self.events.emit_lossy(NarrationEvent::SegmentFailed {
                    index,
                    message: e.to_string(),
                    user_visible: true,
                    timestamp: Utc::now(),
                });
                RETRY_DELAY
            }
        };

        let next = index + 1;
        self.playhead = next;
        if next >= self.queue.len() {
            self.complete_queue();
        } else {
            self.schedule_tick(next, delay);
            self.run_preload_policy();
        }
    }

    fn complete_queue(&mut self) {
        info!("All segments complete");
        self.playhead = self.queue.len();
        self.waiting_on_fetch = None;
        self.set_state(SchedulerState::Idle);
        self.events.emit_lossy(NarrationEvent::QueueCompleted {
            timestamp: Utc::now(),
        });
    }

    /// Maintain the sliding preload window ahead of the playhead
    ///
    /// Runs after every index advance and every completed preload. Never
    /// re-requests an index already preloaded or loading, and never
    /// fetches a segment whose conversation is stale.
    fn run_preload_policy(&mut self) {
        if self.state != SchedulerState::Playing {
            return;
        }
        let max_preload = self.settings.get().max_preload;
        for index in preload_range(self.playhead, max_preload, self.queue.len()) {
            if self.preloaded.contains_key(&index) || self.loading.contains(&index) {
                continue;
            }
            if let Some(active) = self.active_conversation {
                if self.queue[index].conversation_id != active {
                    debug!("Skipping preload for stale segment {}", index + 1);
                    continue;
                }
            }
            debug!(
                "Starting preload for segment {}/{}",
                index + 1,
                self.queue.len()
            );
            self.begin_fetch(index);
        }
    }

    fn schedule_tick(&self, index: usize, delay: Duration) {
        let tx = self.tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::AdvanceTick { index, generation });
        });
    }
}

/// Indices to fetch speculatively: up to `max_preload` entries past the
/// playhead, clipped at queue end
fn preload_range(playhead: usize, max_preload: usize, queue_len: usize) -> std::ops::Range<usize> {
    let start = (playhead + 1).min(queue_len);
    let end = (playhead + 1).saturating_add(max_preload).min(queue_len);
    start..end
}
