//! Incremental segmentation for streaming generations
//!
//! Consumes the growing text of an in-flight generation and hands each
//! newly closed paragraph to the segmenter, so playback can start before the
//! generation finishes. A paragraph boundary is an asterisk or quote
//! followed by whitespace ending in a newline (or the end of the buffer).
//!
//! Paragraphs without any marker produce nothing in streaming mode; the
//! whole-block fallback only applies to batch processing.

use crate::text::marker::parse_markers;
use crate::text::segmenter::{segment_text, Segment};
use tracing::debug;
use uuid::Uuid;

/// Incremental paragraph segmenter
///
/// One instance tracks one generation; all state resets once a final update
/// is processed.
#[derive(Debug, Default)]
pub struct StreamSegmenter {
    buffer: String,
    last_processed_len: usize,
    last_paragraph_end: usize,
}

impl StreamSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the full accumulated text of the generation so far
    ///
    /// Returns the segments of every paragraph that closed since the last
    /// update. On a final update the unterminated tail is flushed through
    /// the same path and all internal state resets.
    pub fn update(&mut self, text: &str, is_final: bool, conversation_id: Uuid) -> Vec<Segment> {
        self.buffer.clear();
        self.buffer.push_str(text);

        // Diagnostic pass over just the newly appended suffix.
        if text.len() > self.last_processed_len && text.is_char_boundary(self.last_processed_len) {
            let suffix = &text[self.last_processed_len..];
            let markers = parse_markers(suffix);
            if !markers.is_empty() {
                debug!("{} new markers in streamed suffix", markers.len());
            }
            self.last_processed_len = text.len();
        }

        let mut segments = Vec::new();

        while let Some(end) = find_paragraph_end(&self.buffer, self.last_paragraph_end) {
            let paragraph = &self.buffer[self.last_paragraph_end..end];
            let markers = parse_markers(paragraph);
            if !markers.is_empty() {
                segments.extend(segment_text(paragraph, &markers, conversation_id));
            }
            self.last_paragraph_end = end;
        }

        if is_final {
            let remaining = &self.buffer[self.last_paragraph_end..];
            if !remaining.trim().is_empty() {
                let markers = parse_markers(remaining);
                if !markers.is_empty() {
                    segments.extend(segment_text(remaining, &markers, conversation_id));
                }
            }
            self.reset();
        }

        segments
    }

    /// Discard all buffered state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_processed_len = 0;
        self.last_paragraph_end = 0;
    }
}

/// Next paragraph boundary at or after `from`: an `*` or `"` followed by a
/// whitespace run. The boundary ends after the last newline of the run, or
/// at the end of the buffer when the run reaches it; a run with neither is
/// not a boundary.
fn find_paragraph_end(buffer: &str, from: usize) -> Option<usize> {
    for (off, ch) in buffer[from..].char_indices() {
        if ch != '*' && ch != '"' {
            continue;
        }
        let run_start = from + off + ch.len_utf8();
        let mut run_end = run_start;
        let mut last_newline_end = None;
        for (woff, wch) in buffer[run_start..].char_indices() {
            if !wch.is_whitespace() {
                break;
            }
            run_end = run_start + woff + wch.len_utf8();
            if wch == '\n' {
                last_newline_end = Some(run_end);
            }
        }
        if run_end >= buffer.len() {
            return Some(buffer.len());
        }
        if let Some(end) = last_newline_end {
            return Some(end);
        }
    }
    None
}
