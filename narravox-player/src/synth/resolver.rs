//! Segment-to-request resolution
//!
//! Maps a segment's character/voice-file identity onto a stored voice
//! sample and assembles the synthesis request: emotion codes become named
//! affects, the speaker sample is base64-encoded, and the text is padded
//! with ellipsis markers to bias the engine's prosody at segment
//! boundaries.

use crate::error::{Error, Result};
use crate::text::marker::{MarkerKind, DEFAULT_CHARACTER, DEFAULT_VOICE_FILE};
use crate::text::segmenter::Segment;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use narravox_common::settings::Settings;
use narravox_common::voice::{VoiceRegistry, DEFAULT_VARIANT, NARRATOR_VOICE_ID};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// JSON body sent to the synthesis service
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub speaking_rate: f32,
    pub model: String,
    pub language_iso_code: String,
    pub mime_type: String,
    /// Base64-encoded speaker sample
    pub speaker_audio: String,
    /// Named affects; omitted entirely when the segment carries none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<BTreeMap<String, f32>>,
    /// Hybrid-model tuning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vqscore: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_noised: Option<bool>,
}

/// Resolve a segment against the registry and build its synthesis request
///
/// Unknown characters and variants fall back silently to the narrator's
/// default sample; when even that has no sample the segment cannot be
/// spoken and resolution fails.
pub fn build_request(
    segment: &Segment,
    settings: &Settings,
    voices: &VoiceRegistry,
) -> Result<SynthesisRequest> {
    let mut voice_id = NARRATOR_VOICE_ID.to_string();
    let mut variant = DEFAULT_VARIANT.to_string();

    if segment.character != DEFAULT_CHARACTER {
        if let Some(voice) = voices.find_by_display_name(&segment.character) {
            voice_id = voice.id.clone();
        }
    }

    if !segment.voice_file.is_empty() && segment.voice_file != DEFAULT_VOICE_FILE {
        variant = segment
            .voice_file
            .strip_suffix(".mp3")
            .unwrap_or(&segment.voice_file)
            .to_string();
    }

    if voices.sample(&voice_id, &variant).is_none() {
        warn!(
            "Voice not found: {}, variant: {}, falling back to narrator/default",
            segment.character, variant
        );
        voice_id = NARRATOR_VOICE_ID.to_string();
        variant = DEFAULT_VARIANT.to_string();
    }

    let sample = voices.sample(&voice_id, &variant).ok_or_else(|| {
        Error::Resolve(format!(
            "No voice sample for {} (variant: {})",
            segment.character, variant
        ))
    })?;

    let mut emotions = translate_emotions(segment);

    if settings.force_neutral_narrator
        && matches!(segment.kind, MarkerKind::Narrator | MarkerKind::Action)
    {
        emotions.clear();
        emotions.insert("neutral".to_string(), 1.0);
    }

    let (vqscore, speaker_noised) = if settings.is_hybrid_model() {
        (Some(settings.vqscore), Some(settings.speaker_noised))
    } else {
        (None, None)
    };

    Ok(SynthesisRequest {
        text: pad_with_ellipses(&segment.text),
        speaking_rate: settings.speaking_rate,
        model: settings.model.clone(),
        language_iso_code: settings.language_iso_code.clone(),
        mime_type: "audio/webm".to_string(),
        speaker_audio: BASE64.encode(sample),
        emotion: if emotions.is_empty() {
            None
        } else {
            Some(emotions)
        },
        vqscore,
        speaker_noised,
    })
}

/// Translate segment emotion codes into the service's named affects
fn translate_emotions(segment: &Segment) -> BTreeMap<String, f32> {
    segment
        .emotions
        .iter()
        .map(|(code, value)| (code.affect_name().to_string(), *value))
        .collect()
}

/// Pad the request text with leading/trailing ellipsis markers unless
/// already present
fn pad_with_ellipses(text: &str) -> String {
    let mut padded = text.to_string();
    if !padded.starts_with("...") && !padded.starts_with(" ...") {
        padded = format!("... {}", padded);
    }
    if !padded.ends_with("...") && !padded.ends_with("... ") {
        padded = format!("{} ...", padded);
    }
    padded
}
