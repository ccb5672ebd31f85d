use ghostline_context::{normalize_for_match, normalize_lines};
use tracing::warn;

/// Where the un-shown part of a still-valid prediction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matchup {
    /// Line delta from the prediction's creation point to the cursor.
    pub start_line: usize,
    /// Character column on the completion line where un-shown text begins.
    pub start_character: usize,
    /// Byte offset into the raw inserted text where un-shown text begins.
    pub start_index: usize,
}

/// Determine whether the user's typing so far is still consistent with a
/// stored prediction, and where in the predicted text the remaining
/// insertion begins.
///
/// Both prefixes are compared after match normalization (indentation and
/// trailing-space edits must not invalidate a cached prediction). Pure
/// function; identical inputs always yield identical results.
pub fn matchup(
    current_prefix: &str,
    stored_prefix: &str,
    inserted_text: &str,
) -> Option<Matchup> {
    let ncur = normalize_for_match(current_prefix);
    let nstored = normalize_for_match(stored_prefix);

    // The cursor must be at or past the creation point; equal lengths mean
    // "no new typing yet" and are allowed.
    if ncur.len() < nstored.len() {
        return None;
    }

    // The user's total typed text must be a literal continuation of
    // prefix + prediction.
    let combined = normalize_for_match(&format!("{stored_prefix}{inserted_text}"));
    if !combined.starts_with(&ncur) {
        return None;
    }
    // Trailing blank lines of the stored prefix collapse when it is
    // normalized in isolation, but survive inside the current prefix once
    // typing continues past them. Slice the typed extra off against the
    // uncollapsed form first so those newlines are not misread as typing.
    let nstored_lines = normalize_lines(stored_prefix);
    let (anchor, extra) = if let Some(rest) = ncur.strip_prefix(nstored_lines.as_str()) {
        (nstored_lines.as_str(), rest)
    } else if let Some(rest) = ncur.strip_prefix(nstored.as_str()) {
        (nstored.as_str(), rest)
    } else {
        return None;
    };

    let ncur_lines: Vec<&str> = ncur.split('\n').collect();
    let stored_line_count = anchor.split('\n').count();
    let start_line = ncur_lines.len() - stored_line_count;

    // Locate the cursor column inside the reconstructed completion line.
    let cursor_line_idx = ncur_lines.len() - 1;
    let fragment = ncur_lines[cursor_line_idx];
    let completion_line = match combined.split('\n').nth(cursor_line_idx) {
        Some(line) => line,
        None => {
            warn!(cursor_line_idx, "matchup: completion line missing despite containment");
            return None;
        }
    };
    let column = match completion_line.find(fragment) {
        Some(byte_col) => {
            completion_line[..byte_col].chars().count() + fragment.chars().count()
        }
        None => {
            // Containment was already established, so a failed search is a
            // bug, not a legitimate cache miss.
            warn!(fragment, "matchup: column search failed despite containment");
            return None;
        }
    };

    // Map the normalized typed-extra back onto the raw insertion to find
    // where un-shown text begins.
    let start_index = match map_extra_to_raw(extra, inserted_text) {
        Some(index) => index,
        None => {
            warn!("matchup: typed text not mappable onto raw insertion");
            return None;
        }
    };

    Some(Matchup {
        start_line,
        start_character: column,
        start_index,
    })
}

/// Walk the raw insertion and the normalized typed-extra in lockstep,
/// skipping raw whitespace that normalization removed. Returns the byte
/// offset in `raw` just past the consumed portion.
fn map_extra_to_raw(extra: &str, raw: &str) -> Option<usize> {
    let mut raw_chars = raw.char_indices().peekable();
    let mut extra_chars = extra.chars().peekable();
    let mut index = 0;

    while let Some(&expected) = extra_chars.peek() {
        match raw_chars.peek() {
            Some(&(at, got)) if got == expected => {
                index = at + got.len_utf8();
                raw_chars.next();
                extra_chars.next();
            }
            // A space in the typed-extra that the insertion does not carry:
            // it came from trailing whitespace of the stored prefix that
            // normalization trimmed away. Consume it without moving in raw.
            _ if expected == ' ' || expected == '\t' => {
                extra_chars.next();
            }
            // Indentation or trailing space in the raw insertion that
            // normalization stripped from the typed text.
            Some(&(at, got)) if got == ' ' || got == '\t' => {
                index = at + got.len_utf8();
                raw_chars.next();
            }
            _ => return None,
        }
    }
    Some(index)
}
