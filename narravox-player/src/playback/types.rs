//! Playback state types

use crate::text::segmenter::Segment;
use serde::{Deserialize, Serialize};

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Playing,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Playing => write!(f, "playing"),
        }
    }
}

/// Audio fetched ahead of the playhead, waiting for its turn
///
/// Owned exclusively by the scheduler task; dropped on consumption or
/// reset.
#[derive(Debug)]
pub struct PreloadedAudio {
    pub queue_index: usize,
    pub segment: Segment,
    /// Encoded audio blob as returned by the synthesis service
    pub audio: Vec<u8>,
}
