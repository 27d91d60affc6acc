//! Voice resolution and speech synthesis
//!
//! [`resolver`] turns a segment into an outbound synthesis request against
//! the voice registry; [`client`] carries the request to the text-to-speech
//! service.

pub mod client;
pub mod resolver;

pub use client::{HttpSpeechBackend, SpeechBackend};
pub use resolver::{build_request, SynthesisRequest};
