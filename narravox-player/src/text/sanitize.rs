//! Segment text sanitization
//!
//! Every segment's text passes through [`sanitize_text`] before it is queued.
//! The rules run in a fixed order and the whole pipeline is idempotent:
//!
//! 1. double-hyphen becomes an em dash
//! 2. asterisks and quotation marks are stripped
//! 3. whitespace runs collapse to a single space
//! 4. characters outside `[A-Za-z0-9 .,!?'();-–—]` are stripped
//! 5. a hyphen joining two word characters becomes an en dash
//! 6. a hyphen run following a word character becomes an em dash
//! 7. whitespace followed by a hyphen run becomes a spaced em dash
//! 8. dash runs collapse (em-dash-bearing runs to one em dash, en dash runs
//!    to one en dash)
//! 9. em dashes get single surrounding spaces
//! 10. leading/trailing whitespace is trimmed

/// Sanitize one segment's text for synthesis
pub fn sanitize_text(text: &str) -> String {
    let mut s = text.replace("--", "—");
    s.retain(|c| c != '*' && c != '"');
    let s = collapse_whitespace(&s);
    let s: String = s.chars().filter(|&c| is_allowed(c)).collect();
    let s = en_dash_joined_words(&s);
    let s = em_dash_after_word(&s);
    let s = em_dash_after_space(&s);
    let s = collapse_dash_runs(&s);
    let s = space_em_dashes(&s);
    s.trim().to_string()
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || matches!(c, '.' | ',' | '!' | '?' | '\'' | '(' | ')' | ';' | '-' | '–' | '—')
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_ws = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_ws {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    out
}

/// `word-word` becomes `word–word`; the scan consumes both word characters,
/// so `a-b-c` converts only the first hyphen (the second is handled by the
/// em dash rule)
fn en_dash_joined_words(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if i + 2 < chars.len()
            && chars[i + 1] == '-'
            && is_word(chars[i])
            && is_word(chars[i + 2])
        {
            out.push(chars[i]);
            out.push('–');
            out.push(chars[i + 2]);
            i += 3;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// A hyphen run directly after a word character becomes one em dash
fn em_dash_after_word(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '-' && i > 0 && is_word(chars[i - 1]) {
            while i < chars.len() && chars[i] == '-' {
                i += 1;
            }
            out.push('—');
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Whitespace followed by a hyphen run becomes `" —"`
fn em_dash_after_space(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            let ws_start = i;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            if i < chars.len() && chars[i] == '-' {
                while i < chars.len() && chars[i] == '-' {
                    i += 1;
                }
                out.push_str(" —");
            } else {
                out.extend(&chars[ws_start..i]);
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Collapse dash runs: any run of `—`/`-` containing an em dash becomes one
/// em dash; a run of en dashes becomes one en dash
fn collapse_dash_runs(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '—' | '-' => {
                let start = i;
                let mut has_em = false;
                while i < chars.len() && (chars[i] == '—' || chars[i] == '-') {
                    if chars[i] == '—' {
                        has_em = true;
                    }
                    i += 1;
                }
                if has_em {
                    out.push('—');
                } else {
                    out.extend(&chars[start..i]);
                }
            }
            '–' => {
                while i < chars.len() && chars[i] == '–' {
                    i += 1;
                }
                out.push('–');
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Normalize the whitespace around every em dash to exactly one space on
/// each side
fn space_em_dashes(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let ws_start = i;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i < chars.len() && chars[i] == '—' {
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            out.push_str(" — ");
        } else {
            out.extend(&chars[ws_start..i]);
            if i < chars.len() {
                out.push(chars[i]);
                i += 1;
            }
        }
    }
    out
}
