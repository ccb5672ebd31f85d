use serde::{Deserialize, Serialize};

/// A cursor position. `character` counts chars, not bytes, on the line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// A half-open range in the document. Zero-width when `start == end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Zero-width range at a cursor position.
    pub fn caret(at: Position) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A candidate insertion returned to the editor.
///
/// `replace` is ordinarily a zero-width range at the cursor; for
/// redo-suffix completions it may extend over part or all of the existing
/// line suffix. The editor applies the edit; the engine never mutates the
/// buffer itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineCompletion {
    /// Id of the backing prediction, for acceptance reporting.
    pub id: u64,
    /// The exact text to insert.
    pub text: String,
    /// The range the insertion replaces.
    pub replace: Range,
}
