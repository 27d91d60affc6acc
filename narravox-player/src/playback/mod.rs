//! Segment playback
//!
//! A queue of segments played strictly in order, with up to `max_preload`
//! segments fetched speculatively ahead of the playhead.

pub mod output;
pub mod scheduler;
pub mod types;

pub use output::{AudioHandle, AudioOutput, RodioOutput};
pub use scheduler::PlaybackScheduler;
pub use types::{PreloadedAudio, SchedulerState};
