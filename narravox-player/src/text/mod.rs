//! Text processing: marker extraction, segmentation, sanitization
//!
//! Raw generated text flows through [`marker::parse_markers`] and
//! [`segmenter::segment_text`] to become an ordered list of speakable
//! [`segmenter::Segment`]s. [`stream::StreamSegmenter`] drives the same path
//! incrementally for streaming generations.

pub mod marker;
pub mod sanitize;
pub mod segmenter;
pub mod stream;

pub use marker::{parse_markers, Marker, MarkerKind};
pub use sanitize::sanitize_text;
pub use segmenter::{segment_text, Segment};
pub use stream::StreamSegmenter;
