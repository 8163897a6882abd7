//! Text normalization for suggestion keys and storage path segments
//!
//! Every name that reaches the store or the cache goes through `normalize`
//! first, so two spellings that differ only in case, spacing or punctuation
//! collapse onto the same document.

use regex::Regex;
use std::sync::LazyLock;

/// Longest normalized key kept
pub const MAX_KEY_LEN: usize = 100;

/// Shortest normalized text accepted for recording
pub const MIN_RECORD_LEN: usize = 2;

/// Longest storage segment the document store accepts
pub const MAX_SEGMENT_LEN: usize = 1500;

/// Segment used when the input normalizes to nothing
pub const EMPTY_SEGMENT: &str = "unnamed";

/// Runs of the same character at least this long are treated as keyboard mash
const MAX_REPEAT_RUN: usize = 5;

static BLOCKLIST: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // pure numbers
        r"^[0-9]+$",
        // one or two letters
        r"^[a-z]{1,2}$",
        // throwaway and reserved words
        r"^(test|spam|admin|delete)",
        // keyboard mash
        r"^(asdf|qwer|zxcv|hjkl)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Turn free text into a canonical suggestion key.
///
/// Lowercases, trims, turns whitespace runs into `_`, keeps only ASCII word
/// characters plus `-` and `'`, collapses `_` runs, strips `_` from both ends
/// and caps the result at [`MAX_KEY_LEN`] characters. Idempotent.
pub fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '\'') {
            out.push(ch);
        }
    }

    let mut collapsed = String::with_capacity(out.len());
    let mut last_underscore = false;
    for ch in out.chars() {
        if ch == '_' {
            if last_underscore {
                continue;
            }
            last_underscore = true;
        } else {
            last_underscore = false;
        }
        collapsed.push(ch);
    }

    // Every remaining char is ASCII, so byte truncation is char-safe.
    let mut key = collapsed.trim_matches('_').to_string();
    key.truncate(MAX_KEY_LEN);
    key.trim_end_matches('_').to_string()
}

/// Whether text is worth recording as a suggestion.
///
/// Rejects anything that normalizes to fewer than [`MIN_RECORD_LEN`]
/// characters, pure numbers, one- or two-letter strings, long runs of one
/// repeated character and obvious test or keyboard-mash input.
pub fn should_record(text: &str) -> bool {
    let key = normalize(text);
    if key.chars().count() < MIN_RECORD_LEN {
        return false;
    }

    if has_repeat_run(&key, MAX_REPEAT_RUN) {
        return false;
    }

    !BLOCKLIST.iter().any(|re| re.is_match(&key))
}

/// Normalize text into a segment that is safe inside a document path.
///
/// Never empty, never contains `/`, never wrapped in `__` on both ends,
/// never longer than [`MAX_SEGMENT_LEN`].
pub fn to_storage_segment(text: &str) -> String {
    let mut segment = normalize(text).replace('/', "_");

    if segment.starts_with("__") && segment.ends_with("__") {
        segment = segment.trim_matches('_').to_string();
    }
    segment.truncate(MAX_SEGMENT_LEN);

    if segment.is_empty() || segment == "." || segment == ".." {
        return EMPTY_SEGMENT.to_string();
    }
    segment
}

fn has_repeat_run(text: &str, run: usize) -> bool {
    let mut previous = None;
    let mut length = 0;
    for ch in text.chars() {
        if Some(ch) == previous {
            length += 1;
        } else {
            previous = Some(ch);
            length = 1;
        }
        if length >= run {
            return true;
        }
    }
    false
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod normalize_tests;
