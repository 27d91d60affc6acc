//! Engine facade
//!
//! The inversion-of-control boundary between the host application and the
//! narration pipeline. The host wires whatever event dispatch it has onto
//! these methods; the engine holds no dependency on a specific event
//! system.

use crate::playback::scheduler::{PlaybackScheduler, SharedVoices};
use crate::prompt;
use crate::text::marker::parse_markers;
use crate::text::segmenter::segment_text;
use crate::text::stream::StreamSegmenter;
use narravox_common::events::EventBus;
use narravox_common::settings::SettingsStore;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Top-level narration engine
pub struct NarrationEngine {
    settings: SettingsStore,
    voices: SharedVoices,
    scheduler: PlaybackScheduler,
    stream: Mutex<StreamSegmenter>,
    events: EventBus,
}

impl NarrationEngine {
    pub fn new(
        settings: SettingsStore,
        voices: SharedVoices,
        scheduler: PlaybackScheduler,
        events: EventBus,
    ) -> Self {
        Self {
            settings,
            voices,
            scheduler,
            stream: Mutex::new(StreamSegmenter::new()),
            events,
        }
    }

    /// A complete assistant message is ready for narration
    ///
    /// Resets any in-flight playback, then parses, segments, and enqueues
    /// the message. Returns the number of segments queued; zero when the
    /// engine is disabled or the message carries no markers.
    pub fn on_message_ready(&self, text: &str, conversation_id: Uuid) -> usize {
        if !self.settings.get().enabled {
            return 0;
        }
        debug!("Processing message for narration ({} bytes)", text.len());

        self.scheduler.reset(true);
        self.scheduler.set_conversation(conversation_id);

        let markers = parse_markers(text);
        if markers.is_empty() {
            warn!("No voice markers found in message");
            return 0;
        }
        info!("Found {} voice markers in message", markers.len());

        let segments = segment_text(text, &markers, conversation_id);
        let count = segments.len();
        self.scheduler.enqueue(segments);
        count
    }

    /// A streaming generation produced more text
    ///
    /// `full_text` is the whole accumulated generation so far. Newly closed
    /// paragraphs are segmented and appended to the live queue, so playback
    /// starts before the generation finishes. Active only when both the
    /// engine and auto-generation are enabled.
    pub fn on_stream_token(&self, full_text: &str, is_final: bool, conversation_id: Uuid) -> usize {
        let settings = self.settings.get();
        if !settings.enabled || !settings.auto_generation {
            return 0;
        }
        self.scheduler.set_conversation(conversation_id);

        let segments = self
            .stream
            .lock()
            .expect("stream segmenter lock poisoned")
            .update(full_text, is_final, conversation_id);
        let count = segments.len();
        if count > 0 {
            self.scheduler.enqueue(segments);
        }
        count
    }

    /// The host switched to a different conversation
    pub fn on_conversation_changed(&self, conversation_id: Uuid) {
        debug!("Conversation changed; resetting playback");
        self.scheduler.set_conversation(conversation_id);
        self.scheduler.reset(true);
        self.stream
            .lock()
            .expect("stream segmenter lock poisoned")
            .reset();
    }

    /// A message was edited; queued audio no longer matches it
    pub fn on_message_edited(&self) {
        self.scheduler.reset(true);
    }

    /// A message was deleted
    pub fn on_message_deleted(&self) {
        self.scheduler.reset(true);
    }

    /// The user swiped to an alternative generation
    pub fn on_message_swiped(&self) {
        self.scheduler.reset(true);
    }

    /// Instruction block for the host to inject into the outbound prompt
    ///
    /// None while the engine is disabled.
    pub fn prompt_instructions(&self) -> Option<String> {
        if !self.settings.get().enabled {
            return None;
        }
        let voices = self.voices.read().expect("voice registry lock poisoned");
        Some(prompt::instructions(&voices))
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }
}
