//! # Narravox player library (narravox-player)
//!
//! Turns marker-annotated narrative text into a queue of speakable
//! segments and plays them back with bounded speculative preloading
//! against a remote text-to-speech service.
//!
//! **Pipeline:** raw text → marker parser → segmenter → playback scheduler
//! → (voice resolver → synthesis service) → audio output. The stream
//! segmenter sits in front of the segmenter for incremental input.

pub mod engine;
pub mod error;
pub mod playback;
pub mod prompt;
pub mod synth;
pub mod text;

pub use engine::NarrationEngine;
pub use error::{Error, Result};
pub use playback::{PlaybackScheduler, SchedulerState};
pub use text::{Marker, MarkerKind, Segment};
