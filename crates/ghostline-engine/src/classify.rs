use ghostline_context::{window_prefix, window_suffix, CursorContext};
use ghostline_protocol::PredictionKind;

/// Stop generation at any line break (single-line strategies).
pub const STOP_LINE_BREAK: &str = "\n";
/// Stop generation at a blank line (multi-line continuation).
pub const STOP_DOUBLE_LINE_BREAK: &str = "\n\n";

/// Longest remainder of the current line (non-whitespace) that still
/// triggers a redo-suffix completion.
const REDO_SUFFIX_MAX_CHARS: usize = 3;

/// The classifier's decision for one request. Ephemeral; recomputed on
/// every request, never persisted.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub kind: PredictionKind,
    pub should_generate: bool,
    /// Text sent to the model as the prefix (windowed, possibly adjusted).
    pub model_prefix: String,
    /// Text sent to the model as the suffix (windowed, possibly adjusted).
    pub model_suffix: String,
    pub stop: Vec<String>,
}

impl CompletionOptions {
    fn skip() -> Self {
        Self {
            kind: PredictionKind::DoNotPredict,
            should_generate: false,
            model_prefix: String::new(),
            model_suffix: String::new(),
            stop: Vec::new(),
        }
    }
}

/// Decide which prediction strategy to use for the current context.
///
/// Prefix and suffix are windowed to at most `window_lines` lines in the
/// respective direction first, bounding model context size and latency.
/// Multi-line continuation is only attempted right after an accept, to
/// support chained multi-line typing without over-generating on every
/// keystroke; single-line completions dominate perceived responsiveness.
pub fn classify(
    ctx: &CursorContext,
    recently_accepted: bool,
    window_lines: usize,
) -> CompletionOptions {
    let prefix = window_prefix(&ctx.prefix, window_lines);
    let suffix = window_suffix(&ctx.suffix, window_lines);

    let line_prefix_blank = ctx.line_prefix.trim().is_empty();
    let line_suffix_trimmed = ctx.line_suffix.trim();

    // Continue on the next line, but only while the user is chaining accepts
    // and nothing sits right of the cursor.
    if recently_accepted && ctx.line_suffix.is_empty() {
        return CompletionOptions {
            kind: PredictionKind::MultiLineStartOnNextLine,
            should_generate: true,
            model_prefix: format!("{prefix}\n"),
            model_suffix: suffix,
            stop: vec![STOP_DOUBLE_LINE_BREAK.to_string()],
        };
    }

    // Blank line under the cursor: plain fill-in-middle.
    if line_prefix_blank && line_suffix_trimmed.is_empty() {
        return CompletionOptions {
            kind: PredictionKind::SingleLineFillMiddle,
            should_generate: true,
            model_prefix: prefix,
            model_suffix: suffix,
            stop: vec![STOP_LINE_BREAK.to_string()],
        };
    }

    // A short line remainder is cheaper to regenerate than to complete
    // around; the model sees everything except the current line's suffix.
    if !line_suffix_trimmed.is_empty() && line_suffix_trimmed.chars().count() <= REDO_SUFFIX_MAX_CHARS
    {
        let suffix_after_line = match ctx.suffix.find('\n') {
            Some(pos) => window_suffix(&ctx.suffix[pos..], window_lines),
            None => String::new(),
        };
        return CompletionOptions {
            kind: PredictionKind::SingleLineRedoSuffix,
            should_generate: true,
            model_prefix: prefix,
            model_suffix: suffix_after_line,
            stop: vec![STOP_LINE_BREAK.to_string()],
        };
    }

    // Nontrivial prefix on the line: fill the middle up to the line break.
    if !line_prefix_blank {
        return CompletionOptions {
            kind: PredictionKind::SingleLineFillMiddle,
            should_generate: true,
            model_prefix: prefix,
            model_suffix: suffix,
            stop: vec![STOP_LINE_BREAK.to_string()],
        };
    }

    // Suffix text but no prefix text on the line: nothing worth predicting.
    CompletionOptions::skip()
}
