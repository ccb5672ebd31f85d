use crate::matchup::Matchup;
use ghostline_context::CursorContext;
use ghostline_protocol::{Position, PredictionKind, Range};

/// Turn the raw model insertion into the minimal safe text to insert,
/// paired with the range it replaces.
///
/// The rules are applied in a fixed order on the remaining insertion
/// (everything past `matchup.start_index`): duplicate-whitespace skip,
/// leading-newline strip on blank lines, redo-suffix punctuation
/// truncation, single-line forcing, bracket-balance truncation, then
/// edge-whitespace tidying. The replace range is zero-width at the cursor
/// except for redo-suffix completions, which may replace part or all of
/// the existing line suffix.
pub fn postprocess(
    matchup: &Matchup,
    kind: PredictionKind,
    inserted_text: &str,
    ctx: &CursorContext,
) -> (String, Range) {
    let caret = Position::new(ctx.cursor_line(), ctx.cursor_character());
    let remaining = &inserted_text[matchup.start_index.min(inserted_text.len())..];

    let mut start = 0usize;
    let mut end = remaining.len();

    // 1. The user already typed a trailing space/tab; do not insert another.
    if ctx.line_prefix.ends_with([' ', '\t']) {
        while remaining[start..end].starts_with([' ', '\t']) {
            start += 1;
        }
    }

    // 2. Already on a blank line: do not open with more blank lines. A
    // leading line counts as blank even when it carries whitespace.
    if ctx.line_prefix.trim().is_empty() && ctx.line_suffix.trim().is_empty() {
        loop {
            let current = &remaining[start..end];
            let Some(newline_at) = current.find('\n') else {
                break;
            };
            if !current[..newline_at].trim().is_empty() {
                break;
            }
            start += newline_at + 1;
        }
    }

    // 3. Redo-suffix: the user's closing punctuation must not be emitted
    // twice. Cut at the last occurrence of the old suffix's first char when
    // that char is a bracket or quote.
    if kind == PredictionKind::SingleLineRedoSuffix {
        let trimmed_suffix = ctx.line_suffix.trim();
        if let Some(first) = trimmed_suffix.chars().next() {
            if is_bracket_or_quote(first) {
                if let Some(at) = remaining[start..end].rfind(first) {
                    end = start + at;
                }
            }
        }
    }

    // 4. Prefix text, no suffix text, nonblank first line: force a
    // single-line completion even if the model produced more.
    if !ctx.line_prefix.trim().is_empty() && ctx.line_suffix.trim().is_empty() {
        let current = &remaining[start..end];
        let first_line = current.split('\n').next().unwrap_or("");
        if !first_line.trim().is_empty() {
            if let Some(newline_at) = current.find('\n') {
                end = start + newline_at;
            }
        }
    }

    // 5. Stop at the first closer with no matching opener, counting openers
    // already present in the buffer prefix.
    end = start + truncate_unbalanced(&ctx.prefix, &remaining[start..end]);

    let text = tidy_edges(&remaining[start..end]);
    let replace = replace_range(kind, caret, &ctx.line_suffix, &text);
    (text, replace)
}

/// Extract the payload from a fenced code block, if the model wrapped its
/// completion in one.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return text;
    }
    let Some(body_start) = trimmed.find('\n') else {
        return text;
    };
    let body = &trimmed[body_start + 1..];
    match body.rfind("```") {
        Some(fence_at) => body[..fence_at].trim_end_matches('\n'),
        None => body,
    }
}

fn is_bracket_or_quote(c: char) -> bool {
    matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '"' | '\'' | '`')
}

fn opener_of(closer: char) -> char {
    match closer {
        ')' => '(',
        ']' => '[',
        '}' => '{',
        _ => closer,
    }
}

/// Length of the longest prefix of `insertion` with no unbalanced closer,
/// seeding the depth stack from `prefix` so closers matching something
/// already open in the buffer are accepted.
fn truncate_unbalanced(prefix: &str, insertion: &str) -> usize {
    let mut stack: Vec<char> = Vec::new();
    for c in prefix.chars() {
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                if stack.last().copied() == Some(opener_of(c)) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }
    for (at, c) in insertion.char_indices() {
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                if stack.last().copied() == Some(opener_of(c)) {
                    stack.pop();
                } else {
                    return at;
                }
            }
            _ => {}
        }
    }
    insertion.len()
}

/// Edge-whitespace rule: leading space/tab runs collapse to a single
/// space, trailing whitespace is dropped, interior whitespace untouched.
fn tidy_edges(text: &str) -> String {
    let body = text.trim_end_matches([' ', '\t', '\n']);
    let without_lead = body.trim_start_matches([' ', '\t']);
    if without_lead.len() != body.len() && !without_lead.is_empty() {
        format!(" {without_lead}")
    } else {
        without_lead.to_string()
    }
}

/// How much of the old line suffix a redo-suffix completion replaces.
fn replace_range(
    kind: PredictionKind,
    caret: Position,
    line_suffix: &str,
    new_text: &str,
) -> Range {
    if kind != PredictionKind::SingleLineRedoSuffix || line_suffix.trim().is_empty() {
        return Range::caret(caret);
    }
    let (contained, matched_chars) = suffix_overlap(line_suffix, new_text);
    let replaced_chars = if contained {
        // Old suffix fully re-emitted: replace the remainder of the line.
        line_suffix.chars().count()
    } else {
        // Replace only up to the last common matching character.
        matched_chars
    };
    Range::new(
        caret,
        Position::new(caret.line, caret.character + replaced_chars),
    )
}

/// Two-pointer subsequence scan: is every non-whitespace char of the old
/// suffix present, in order, in the new text? Also reports how many chars
/// of the old suffix (counting through whitespace) were covered up to the
/// last match.
fn suffix_overlap(old_suffix: &str, new_text: &str) -> (bool, usize) {
    let mut new_chars = new_text.chars();
    let mut covered = 0usize;
    for (i, c) in old_suffix.chars().enumerate() {
        if c == ' ' || c == '\t' {
            continue;
        }
        if new_chars.any(|n| n == c) {
            covered = i + 1;
        } else {
            return (false, covered);
        }
    }
    (true, covered)
}
