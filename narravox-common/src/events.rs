//! Event types for the narravox event system
//!
//! Provides the shared event definitions and EventBus used by the playback
//! scheduler and the engine facade. The host integration subscribes here to
//! surface notifications; every per-segment outcome is observable without
//! polling scheduler state.
//!
//! # Architecture
//!
//! - **EventBus** (tokio::broadcast): one-to-many event broadcasting
//! - **Command channels** (tokio::mpsc): request → single handler (owned by
//!   the playback scheduler, not defined here)
//! - **Shared state** (watch): read-heavy Idle/Playing observation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why a queued segment was skipped instead of played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Segment belongs to a conversation that is no longer active
    StaleConversation,
    /// The "disable narrator" option is set and the segment is narrator-kind
    NarratorDisabled,
    /// The "silence actions" option is set and the segment is action-kind
    ActionSilenced,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::StaleConversation => write!(f, "stale conversation"),
            SkipReason::NarratorDisabled => write!(f, "narrator disabled"),
            SkipReason::ActionSilenced => write!(f, "action silenced"),
        }
    }
}

/// Narravox event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to a host UI. Per-segment errors stay at segment granularity; only
/// `QueueAborted` reports a whole-queue failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NarrationEvent {
    /// Segments were appended and playback (re)started from the front
    QueueStarted {
        /// Conversation the queued segments belong to
        conversation_id: Uuid,
        /// Queue length after the append
        queue_len: usize,
        /// When playback started
        timestamp: DateTime<Utc>,
    },

    /// A segment began playing
    SegmentStarted {
        /// Queue index of the segment
        index: usize,
        /// Speaking character ("Narrator" for narration/action)
        character: String,
        /// When playback of this segment began
        timestamp: DateTime<Utc>,
    },

    /// A segment finished playing normally
    SegmentFinished {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    /// A segment was bypassed without fetching audio
    SegmentSkipped {
        index: usize,
        reason: SkipReason,
        timestamp: DateTime<Utc>,
    },

    /// A segment failed to resolve, fetch, or play; playback continues
    SegmentFailed {
        index: usize,
        /// Human-readable failure description
        message: String,
        /// Whether the host should surface this as a transient notification
        user_visible: bool,
        timestamp: DateTime<Utc>,
    },

    /// Every queued segment reached a terminal state
    QueueCompleted { timestamp: DateTime<Utc> },

    /// The queue was cleared and playback stopped
    QueueReset {
        /// Whether the reset was forced (bypassing the preserve-queue flag)
        forced: bool,
        timestamp: DateTime<Utc>,
    },

    /// The whole in-flight queue was abandoned (e.g. missing credentials)
    QueueAborted {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The typed settings were updated through the settings store
    SettingsChanged { timestamp: DateTime<Utc> },
}

/// Broadcast bus for narration events
///
/// Cheap to clone; subscribers receive all events emitted after they
/// subscribe. Lagging subscribers lose the oldest buffered events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<NarrationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<NarrationEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` otherwise.
    pub fn emit(
        &self,
        event: NarrationEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<NarrationEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscribers case
    ///
    /// Used on hot paths where nobody listening is a valid state.
    pub fn emit_lossy(&self, event: NarrationEvent) {
        let _ = self.tx.send(event);
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
