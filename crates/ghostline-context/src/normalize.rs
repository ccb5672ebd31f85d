//! Whitespace normalization used for prediction matching, plus line
//! windowing for model context.
//!
//! Matching normalization exists purely to raise the cache-hit rate:
//! indentation and trailing-space edits must not invalidate a cached
//! prediction.

/// Per-line normalization only: leading indentation and trailing
/// whitespace stripped, line structure untouched.
pub fn normalize_lines(text: &str) -> String {
    text.split('\n')
        .map(|line| line.trim_matches([' ', '\t']))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalize text for prediction matching.
///
/// Per line: leading indentation and trailing whitespace are stripped.
/// Trailing blank lines collapse so the text keeps at most one trailing
/// newline.
pub fn normalize_for_match(text: &str) -> String {
    let mut out = normalize_lines(text);
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

/// Keep only the last `max_lines` lines of a prefix.
pub fn window_prefix(prefix: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = prefix.split('\n').collect();
    if lines.len() <= max_lines {
        return prefix.to_string();
    }
    lines[lines.len() - max_lines..].join("\n")
}

/// Keep only the first `max_lines` lines of a suffix.
pub fn window_suffix(suffix: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = suffix.split('\n').collect();
    if lines.len() <= max_lines {
        return suffix.to_string();
    }
    lines[..max_lines].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_indentation_and_trailing_space() {
        assert_eq!(normalize_for_match("  foo  \n\tbar\t"), "foo\nbar");
    }

    #[test]
    fn keeps_interior_blank_lines() {
        assert_eq!(normalize_for_match("foo\n\nbar"), "foo\n\nbar");
    }

    #[test]
    fn line_normalization_keeps_trailing_newlines() {
        assert_eq!(normalize_lines("foo\n\n\n"), "foo\n\n\n");
        assert_eq!(normalize_lines("  foo  \n  \n"), "foo\n\n");
    }

    #[test]
    fn collapses_trailing_newlines_to_one() {
        assert_eq!(normalize_for_match("foo\n"), "foo\n");
        assert_eq!(normalize_for_match("foo\n\n\n"), "foo\n");
        assert_eq!(normalize_for_match("foo\n  \n"), "foo\n");
    }

    #[test]
    fn idempotent() {
        let once = normalize_for_match("  a \n b\n\n");
        assert_eq!(normalize_for_match(&once), once);
    }

    #[test]
    fn windows_long_prefix_from_the_end() {
        let text = (0..30).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let windowed = window_prefix(&text, 25);
        assert_eq!(windowed.split('\n').count(), 25);
        assert!(windowed.starts_with("5\n"));
        assert!(windowed.ends_with("29"));
    }

    #[test]
    fn windows_long_suffix_from_the_start() {
        let text = (0..30).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let windowed = window_suffix(&text, 25);
        assert_eq!(windowed.split('\n').count(), 25);
        assert!(windowed.starts_with("0\n"));
        assert!(windowed.ends_with("24"));
    }

    #[test]
    fn short_text_unchanged_by_windowing() {
        assert_eq!(window_prefix("a\nb", 25), "a\nb");
        assert_eq!(window_suffix("a\nb", 25), "a\nb");
    }
}
