//! Voice marker extraction
//!
//! Scans raw text for markers of the form
//! `§<n|a|c>[:<character>][|<voiceFile>][|<code>:<value>,...]§` and produces
//! one [`Marker`] per non-overlapping, left-to-right match. Parsing is purely
//! lexical: unknown emotion codes are kept verbatim, values are not clamped,
//! and malformed marker syntax simply fails to match and remains literal
//! text.
//!
//! Implemented as an explicit scanner rather than a regex so the exact
//! field-optionality semantics are pinned down in code: the first `|` field
//! is always the voice file and the second is the emotion list (which may
//! itself contain `|`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// The marker delimiter character
const DELIM: char = '§';

/// Default speaker for markers without a character field
pub const DEFAULT_CHARACTER: &str = "Narrator";

/// Default voice file for markers without a voice field
pub const DEFAULT_VOICE_FILE: &str = "default.mp3";

/// Who a span of text belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    /// Scene narration
    Narrator,
    /// Action description (always voiced by the narrator)
    Action,
    /// Named character dialogue
    Character,
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerKind::Narrator => write!(f, "narrator"),
            MarkerKind::Action => write!(f, "action"),
            MarkerKind::Character => write!(f, "character"),
        }
    }
}

/// One parsed marker occurrence
///
/// Immutable once parsed. `position`/`len` are byte offsets into the scanned
/// text; the segment span owned by this marker starts at `end()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,

    /// Speaking character; `"Narrator"` unless kind is Character with a
    /// non-empty name field
    pub character: String,

    /// Voice file reference; `"default.mp3"` when omitted (or for Action
    /// markers, which ignore the field)
    pub voice_file: String,

    /// Raw emotion pairs as written, unknown codes included
    pub emotions: BTreeMap<String, f32>,

    /// Byte offset of the opening `§`
    pub position: usize,

    /// Byte length of the full matched span
    pub len: usize,
}

impl Marker {
    /// Byte offset just past the closing `§`
    pub fn end(&self) -> usize {
        self.position + self.len
    }
}

/// Extract all markers from `text`, in source order
///
/// No side effects, no errors: anything that does not match the grammar is
/// left for the surrounding prose.
pub fn parse_markers(text: &str) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut search_from = 0;

    while let Some(rel) = text[search_from..].find(DELIM) {
        let start = search_from + rel;
        match try_parse_at(text, start) {
            Some(marker) => {
                trace!(
                    kind = %marker.kind,
                    character = %marker.character,
                    position = marker.position,
                    "matched voice marker"
                );
                search_from = marker.end();
                markers.push(marker);
            }
            // Not a marker; the failed § stays literal and scanning resumes
            // right after it.
            None => search_from = start + DELIM.len_utf8(),
        }
    }

    markers
}

fn try_parse_at(text: &str, start: usize) -> Option<Marker> {
    let mut pos = start + DELIM.len_utf8();

    let kind_ch = text[pos..].chars().next()?;
    let kind = match kind_ch {
        'n' => MarkerKind::Narrator,
        'a' => MarkerKind::Action,
        'c' => MarkerKind::Character,
        _ => return None,
    };
    pos += kind_ch.len_utf8();

    let mut name_field = None;
    let mut voice_field = None;
    let mut emotion_field = None;

    if text[pos..].starts_with(':') {
        pos += 1;
        let end = field_end(text, pos, true)?;
        name_field = Some(&text[pos..end]);
        pos = end;
    }
    if text[pos..].starts_with('|') {
        pos += 1;
        let end = field_end(text, pos, true)?;
        voice_field = Some(&text[pos..end]);
        pos = end;
    }
    if text[pos..].starts_with('|') {
        pos += 1;
        let end = field_end(text, pos, false)?;
        emotion_field = Some(&text[pos..end]);
        pos = end;
    }

    if !text[pos..].starts_with(DELIM) {
        return None;
    }
    pos += DELIM.len_utf8();

    let character = match (kind, name_field) {
        (MarkerKind::Character, Some(name)) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_CHARACTER.to_string(),
    };

    // Action markers ignore the voice field even when present.
    let voice_file = match (kind, voice_field) {
        (MarkerKind::Action, _) => DEFAULT_VOICE_FILE.to_string(),
        (_, Some(voice)) if !voice.is_empty() => voice.to_string(),
        _ => DEFAULT_VOICE_FILE.to_string(),
    };

    Some(Marker {
        kind,
        character,
        voice_file,
        emotions: parse_emotion_list(emotion_field.unwrap_or("")),
        position: start,
        len: pos - start,
    })
}

/// End of a field starting at `from`: the next `§` (and `|`, for name/voice
/// fields). None when the text ends before a terminator, which fails the
/// whole match.
fn field_end(text: &str, from: usize, stop_on_pipe: bool) -> Option<usize> {
    for (i, ch) in text[from..].char_indices() {
        if ch == DELIM || (stop_on_pipe && ch == '|') {
            return Some(from + i);
        }
    }
    None
}

/// Parse `code:value` pairs; pairs with an empty code, empty value, or an
/// unparseable value are dropped, everything else is kept verbatim
fn parse_emotion_list(list: &str) -> BTreeMap<String, f32> {
    let mut emotions = BTreeMap::new();
    for pair in list.split(',') {
        let mut parts = pair.splitn(3, ':');
        let (Some(code), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        if code.is_empty() || value.is_empty() {
            continue;
        }
        if let Ok(value) = value.parse::<f32>() {
            emotions.insert(code.to_string(), value);
        }
    }
    emotions
}
