//! Marker-driven text segmentation
//!
//! Walks position-sorted markers over a text block and emits an ordered list
//! of speakable [`Segment`]s. Mixed dialogue/action runs inside one span are
//! split with fixed heuristics:
//!
//! - a character span may contain one embedded `*action*` between two quoted
//!   dialogue parts, or a trailing `*action*` after one dialogue part
//! - an action span may contain one quoted dialogue part, attributed to the
//!   most recent character marker
//!
//! At most one embedded action per character span and exactly one quoted
//! span per sub-pattern are recognized; anything more interleaved falls back
//! to whole-span handling.

use crate::text::marker::{Marker, MarkerKind, DEFAULT_CHARACTER, DEFAULT_VOICE_FILE};
use crate::text::sanitize::sanitize_text;
use narravox_common::EmotionCode;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// One sanitized unit of speech, ready for synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub kind: MarkerKind,

    /// Speaking character; `"Narrator"` for narration and actions
    pub character: String,

    /// Voice file reference resolved against the voice registry later
    pub voice_file: String,

    /// Recognized emotion codes only; unknown codes are dropped when the
    /// owning marker is lowered into segments
    pub emotions: BTreeMap<EmotionCode, f32>,

    /// Sanitized text
    pub text: String,

    /// The chat turn this segment was generated for; stale segments are
    /// skipped after the conversation changes
    pub conversation_id: Uuid,
}

impl Segment {
    fn action(text: String, conversation_id: Uuid) -> Self {
        Self {
            kind: MarkerKind::Action,
            character: DEFAULT_CHARACTER.to_string(),
            voice_file: DEFAULT_VOICE_FILE.to_string(),
            emotions: BTreeMap::new(),
            text,
            conversation_id,
        }
    }

    fn from_marker(marker: &Marker, text: String, conversation_id: Uuid) -> Self {
        Self {
            kind: marker.kind,
            character: marker.character.clone(),
            voice_file: marker.voice_file.clone(),
            emotions: lower_emotions(&marker.emotions),
            text,
            conversation_id,
        }
    }
}

/// Parse raw marker emotion codes into typed codes, dropping unknowns
fn lower_emotions(raw: &BTreeMap<String, f32>) -> BTreeMap<EmotionCode, f32> {
    let mut emotions = BTreeMap::new();
    for (code, value) in raw {
        match EmotionCode::from_code(code) {
            Some(parsed) => {
                emotions.insert(parsed, *value);
            }
            None => debug!("Ignoring unknown emotion code '{}'", code),
        }
    }
    emotions
}

/// Segment a text block given its already-extracted markers
///
/// Markers are re-sorted by position before use: streaming re-parses
/// non-monotonic substrings, so caller order cannot be trusted. Sub-segments
/// whose sanitized text is empty are silently dropped, never queued.
pub fn segment_text(text: &str, markers: &[Marker], conversation_id: Uuid) -> Vec<Segment> {
    let mut markers: Vec<&Marker> = markers.iter().collect();
    markers.sort_by_key(|m| m.position);

    let mut segments = Vec::new();

    if markers.is_empty() {
        if !text.trim().is_empty() {
            push_if_nonempty(&mut segments, Segment::action(sanitize_text(text), conversation_id));
        }
        return segments;
    }

    let mut last_character_marker: Option<&Marker> = None;

    for (index, marker) in markers.iter().enumerate() {
        let end = markers
            .get(index + 1)
            .map(|next| next.position)
            .unwrap_or(text.len());
        let span = &text[marker.end().min(end)..end];

        if marker.kind == MarkerKind::Character {
            last_character_marker = Some(marker);
        }

        match marker.kind {
            MarkerKind::Character => {
                segment_character_span(&mut segments, span, marker, conversation_id)
            }
            MarkerKind::Action => segment_action_span(
                &mut segments,
                span,
                last_character_marker,
                conversation_id,
            ),
            MarkerKind::Narrator => push_if_nonempty(
                &mut segments,
                Segment::from_marker(marker, sanitize_text(span), conversation_id),
            ),
        }
    }

    segments
}

fn push_if_nonempty(segments: &mut Vec<Segment>, segment: Segment) {
    if !segment.text.is_empty() {
        segments.push(segment);
    }
}

/// Character span: dialogue / embedded action / dialogue, dialogue with a
/// trailing action, or plain dialogue
fn segment_character_span(
    segments: &mut Vec<Segment>,
    span: &str,
    marker: &Marker,
    conversation_id: Uuid,
) {
    if let Some((first, action, second)) = split_dialogue_action_dialogue(span) {
        push_if_nonempty(
            segments,
            Segment::from_marker(marker, sanitize_text(strip_outer_quotes(first)), conversation_id),
        );
        push_if_nonempty(
            segments,
            Segment::action(sanitize_text(action.trim()), conversation_id),
        );
        push_if_nonempty(
            segments,
            Segment::from_marker(marker, sanitize_text(strip_outer_quotes(second)), conversation_id),
        );
    } else if let Some((dialogue, action)) = split_dialogue_action_end(span) {
        push_if_nonempty(
            segments,
            Segment::from_marker(marker, sanitize_text(strip_outer_quotes(dialogue)), conversation_id),
        );
        push_if_nonempty(
            segments,
            Segment::action(sanitize_text(action.trim()), conversation_id),
        );
    } else {
        push_if_nonempty(
            segments,
            Segment::from_marker(marker, sanitize_text(strip_outer_quotes(span)), conversation_id),
        );
    }
}

/// Action span: may contain one quoted dialogue part, attributed to the most
/// recent character marker; without one the whole span stays a single action
fn segment_action_span(
    segments: &mut Vec<Segment>,
    span: &str,
    last_character_marker: Option<&Marker>,
    conversation_id: Uuid,
) {
    if let (Some((leading, dialogue, trailing)), Some(speaker)) =
        (split_action_dialogue(span), last_character_marker)
    {
        push_if_nonempty(
            segments,
            Segment::action(sanitize_text(strip_trailing_asterisk(leading)), conversation_id),
        );
        push_if_nonempty(
            segments,
            Segment::from_marker(speaker, sanitize_text(dialogue.trim()), conversation_id),
        );
        push_if_nonempty(
            segments,
            Segment::action(sanitize_text(strip_trailing_asterisk(trailing)), conversation_id),
        );
    } else {
        push_if_nonempty(
            segments,
            Segment::action(sanitize_text(strip_trailing_asterisk(span)), conversation_id),
        );
    }
}

/// Strip one leading and one trailing quotation mark, then trim
fn strip_outer_quotes(s: &str) -> &str {
    let s = s.strip_prefix('"').unwrap_or(s);
    let s = s.strip_suffix('"').unwrap_or(s);
    s.trim()
}

/// Strip one trailing asterisk, then trim
fn strip_trailing_asterisk(s: &str) -> &str {
    s.strip_suffix('*').unwrap_or(s).trim()
}

fn crosses_line(s: &str) -> bool {
    s.contains('\n') || s.contains('\r')
}

/// `<dialogue>" *<action>* "<dialogue>`: the earliest quote followed by an
/// asterisk-delimited run and a reopening quote wins; prefix and suffix must
/// stay on one line
fn split_dialogue_action_dialogue(span: &str) -> Option<(&str, &str, &str)> {
    for (q1, _) in span.match_indices('"') {
        if crosses_line(&span[..q1]) {
            return None;
        }
        let after = &span[q1 + 1..];
        let Some((action, rest)) = parse_starred_run(after) else {
            continue;
        };
        let rest_trimmed = skip_leading_ws(rest);
        let Some(second) = rest_trimmed.strip_prefix('"') else {
            continue;
        };
        if crosses_line(second) {
            continue;
        }
        return Some((&span[..q1], action, second));
    }
    None
}

/// `<dialogue>" *<action>*` at end of span
fn split_dialogue_action_end(span: &str) -> Option<(&str, &str)> {
    for (q1, _) in span.match_indices('"') {
        if crosses_line(&span[..q1]) {
            return None;
        }
        let after = &span[q1 + 1..];
        let Some((action, rest)) = parse_starred_run(after) else {
            continue;
        };
        if !rest.is_empty() {
            continue;
        }
        return Some((&span[..q1], action));
    }
    None
}

/// Optional whitespace, `*`, a run without asterisks, `*`; returns the inner
/// run and the remainder
fn parse_starred_run(s: &str) -> Option<(&str, &str)> {
    let trimmed = skip_leading_ws(s);
    let inner = trimmed.strip_prefix('*')?;
    let close = inner.find('*')?;
    Some((&inner[..close], &inner[close + 1..]))
}

fn skip_leading_ws(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_whitespace())
}

/// `<action>"<dialogue>"<action>`: first quote pair wins; the trailing part
/// must stay on one line
fn split_action_dialogue(span: &str) -> Option<(&str, &str, &str)> {
    let q1 = span.find('"')?;
    let rest = &span[q1 + 1..];
    let q2 = rest.find('"')?;
    let trailing = &rest[q2 + 1..];
    if crosses_line(trailing) {
        return None;
    }
    Some((&span[..q1], &rest[..q2], trailing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::marker::parse_markers;

    fn conv() -> Uuid {
        Uuid::from_bytes([7; 16])
    }

    fn segment(text: &str) -> Vec<Segment> {
        let markers = parse_markers(text);
        segment_text(text, &markers, conv())
    }

    #[test]
    fn test_no_markers_yields_single_action_segment() {
        let segments = segment("The rain kept falling.");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, MarkerKind::Action);
        assert_eq!(segments[0].character, "Narrator");
        assert_eq!(segments[0].voice_file, "default.mp3");
        assert_eq!(segments[0].text, "The rain kept falling.");
        assert_eq!(segments[0].conversation_id, conv());
    }

    #[test]
    fn test_blank_input_yields_no_segments() {
        assert!(segment("").is_empty());
        assert!(segment("   \n  ").is_empty());
    }

    #[test]
    fn test_three_way_dialogue_action_dialogue_split() {
        let segments = segment("§c:Bob|bob.mp3|e1:0.5§\"Hi\" *waves* \"bye\"");
        assert_eq!(segments.len(), 3);

        assert_eq!(segments[0].kind, MarkerKind::Character);
        assert_eq!(segments[0].character, "Bob");
        assert_eq!(segments[0].voice_file, "bob.mp3");
        assert_eq!(segments[0].emotions.get(&EmotionCode::E1), Some(&0.5));
        assert_eq!(segments[0].text, "Hi");

        assert_eq!(segments[1].kind, MarkerKind::Action);
        assert_eq!(segments[1].character, "Narrator");
        assert!(segments[1].emotions.is_empty());
        assert_eq!(segments[1].text, "waves");

        assert_eq!(segments[2].kind, MarkerKind::Character);
        assert_eq!(segments[2].character, "Bob");
        assert_eq!(segments[2].voice_file, "bob.mp3");
        assert_eq!(segments[2].text, "bye");
    }

    #[test]
    fn test_dialogue_with_trailing_action() {
        let segments = segment("§c:Bob§\"Leaving now\" *slams the door*");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].kind, MarkerKind::Character);
        assert_eq!(segments[0].text, "Leaving now");
        assert_eq!(segments[1].kind, MarkerKind::Action);
        assert_eq!(segments[1].text, "slams the door");
    }

    #[test]
    fn test_plain_character_span_quotes_stripped() {
        let segments = segment("§c:Bob§\"Hello there\"");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, MarkerKind::Character);
        assert_eq!(segments[0].text, "Hello there");
    }

    #[test]
    fn test_action_span_attributes_dialogue_to_last_character() {
        let text = "§c:Bob|bob.mp3|e6:0.4§\"Enough.\" §a§He pauses \"Really?\" and waits";
        let segments = segment(text);
        assert_eq!(segments.len(), 4);

        assert_eq!(segments[0].text, "Enough.");
        assert_eq!(segments[1].kind, MarkerKind::Action);
        assert_eq!(segments[1].text, "He pauses");

        // the quoted part inside the action span belongs to Bob, with
        // Bob's voice and emotions
        assert_eq!(segments[2].kind, MarkerKind::Character);
        assert_eq!(segments[2].character, "Bob");
        assert_eq!(segments[2].voice_file, "bob.mp3");
        assert_eq!(segments[2].emotions.get(&EmotionCode::E6), Some(&0.4));
        assert_eq!(segments[2].text, "Really?");

        assert_eq!(segments[3].kind, MarkerKind::Action);
        assert_eq!(segments[3].text, "and waits");
    }

    #[test]
    fn test_action_span_without_prior_character_stays_whole() {
        let segments = segment("§a§He mutters \"nonsense\" and leaves");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, MarkerKind::Action);
        assert_eq!(segments[0].text, "He mutters nonsense and leaves");
    }

    #[test]
    fn test_narrator_span_verbatim() {
        let segments = segment("§n|calm.mp3|e8:1§The village slept.");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, MarkerKind::Narrator);
        assert_eq!(segments[0].voice_file, "calm.mp3");
        assert_eq!(segments[0].emotions.get(&EmotionCode::E8), Some(&1.0));
        assert_eq!(segments[0].text, "The village slept.");
    }

    #[test]
    fn test_empty_sub_segments_dropped() {
        let segments = segment("§c:Bob§\"\" *nods*");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, MarkerKind::Action);
        assert_eq!(segments[0].text, "nods");
    }

    #[test]
    fn test_unknown_emotion_codes_dropped_from_segments() {
        let segments = segment("§c:Bob|bob.mp3|e1:0.5,e9:0.9§\"Hm.\"");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].emotions.len(), 1);
        assert_eq!(segments[0].emotions.get(&EmotionCode::E1), Some(&0.5));
    }

    #[test]
    fn test_markers_sorted_by_position_before_use() {
        let text = "§n§First. §c:Bob§\"Second.\"";
        let mut markers = parse_markers(text);
        markers.reverse();
        let segments = segment_text(text, &markers, conv());
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].kind, MarkerKind::Narrator);
        assert_eq!(segments[0].text, "First.");
        assert_eq!(segments[1].text, "Second.");
    }

    #[test]
    fn test_multiple_interleavings_not_generalized() {
        // only the first dialogue/action/dialogue triple is recognized;
        // the remainder is mushed into the second dialogue part
        let segments = segment("§c:Bob§\"Hi\" *waves* \"bye\" *sits* \"ok\"");
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "Hi");
        assert_eq!(segments[1].text, "waves");
        assert_eq!(segments[2].kind, MarkerKind::Character);
        assert_eq!(segments[2].text, "bye sits ok");
    }

    #[test]
    fn test_multiline_character_span_falls_back_to_whole_span() {
        let segments = segment("§c:Bob§\"Hi\"\nacross lines *waves* \"bye\"");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, MarkerKind::Character);
        assert_eq!(segments[0].text, "Hi across lines waves bye");
    }

    #[test]
    fn test_consecutive_markers_with_empty_span() {
        let segments = segment("§n§§c:Bob§\"Hi\"");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, MarkerKind::Character);
        assert_eq!(segments[0].text, "Hi");
    }
}
