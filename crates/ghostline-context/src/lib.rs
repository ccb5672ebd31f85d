//! Ghostline Context — Extracts cursor context from buffer text for completions.

mod normalize;

pub use normalize::{normalize_for_match, normalize_lines, window_prefix, window_suffix};

use serde::{Deserialize, Serialize};

/// Everything the engine needs to know about the text around the cursor.
///
/// All fields are derived from LF-normalized text; CRLF buffers are
/// normalized before splitting so offset arithmetic stays consistent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CursorContext {
    /// Full text before the cursor.
    pub prefix: String,
    /// Full text after the cursor.
    pub suffix: String,
    /// Prefix split into lines. The last element is the partial line
    /// left of the cursor.
    pub prefix_lines: Vec<String>,
    /// Suffix split into lines. The first element is the partial line
    /// right of the cursor.
    pub suffix_lines: Vec<String>,
    /// The part of the current line left of the cursor.
    pub line_prefix: String,
    /// The part of the current line right of the cursor.
    pub line_suffix: String,
}

impl CursorContext {
    /// Line index of the cursor (zero-based).
    pub fn cursor_line(&self) -> usize {
        self.prefix_lines.len().saturating_sub(1)
    }

    /// Character (not byte) column of the cursor on its line.
    pub fn cursor_character(&self) -> usize {
        self.line_prefix.chars().count()
    }
}

/// Extract the cursor context from full buffer text and a flat offset.
///
/// Pure function of `(text, offset)`. The offset is interpreted against the
/// LF-normalized text, clamped to its length and snapped back to the nearest
/// char boundary.
pub fn extract(text: &str, offset: usize) -> CursorContext {
    let text = normalize_line_endings(text);

    let mut split = offset.min(text.len());
    while split > 0 && !text.is_char_boundary(split) {
        split -= 1;
    }

    let prefix = text[..split].to_string();
    let suffix = text[split..].to_string();

    let prefix_lines: Vec<String> = prefix.split('\n').map(str::to_string).collect();
    let suffix_lines: Vec<String> = suffix.split('\n').map(str::to_string).collect();

    let line_prefix = prefix_lines.last().cloned().unwrap_or_default();
    let line_suffix = suffix_lines.first().cloned().unwrap_or_default();

    CursorContext {
        prefix,
        suffix,
        prefix_lines,
        suffix_lines,
        line_prefix,
        line_suffix,
    }
}

/// Normalize CRLF (and stray CR) line endings to LF.
pub fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_middle_of_line() {
        let ctx = extract("fn main() {\n    let x = 1;\n}\n", 20);
        assert_eq!(ctx.prefix, "fn main() {\n    let ");
        assert_eq!(ctx.line_prefix, "    let ");
        assert_eq!(ctx.line_suffix, "x = 1;");
        assert_eq!(ctx.cursor_line(), 1);
        assert_eq!(ctx.cursor_character(), 8);
        assert_eq!(ctx.suffix_lines.last().unwrap(), "");
    }

    #[test]
    fn extract_at_start_and_end() {
        let ctx = extract("abc", 0);
        assert_eq!(ctx.prefix, "");
        assert_eq!(ctx.line_suffix, "abc");

        let ctx = extract("abc", 3);
        assert_eq!(ctx.prefix, "abc");
        assert_eq!(ctx.suffix, "");
        assert_eq!(ctx.line_prefix, "abc");
    }

    #[test]
    fn extract_clamps_out_of_range_offset() {
        let ctx = extract("ab", 99);
        assert_eq!(ctx.prefix, "ab");
        assert_eq!(ctx.suffix, "");
    }

    #[test]
    fn extract_snaps_to_char_boundary() {
        // 'é' is two bytes; offset 1 falls inside it
        let ctx = extract("é!", 1);
        assert_eq!(ctx.prefix, "");
        assert_eq!(ctx.suffix, "é!");
    }

    #[test]
    fn crlf_is_normalized_before_splitting() {
        let ctx = extract("a\r\nb\r\nc", 3);
        assert_eq!(ctx.prefix, "a\nb");
        assert_eq!(ctx.prefix_lines, vec!["a", "b"]);
        assert_eq!(ctx.line_prefix, "b");
        assert_eq!(ctx.line_suffix, "");
    }
}
