//! Ghostline Protocol — shared types for the inline completion engine.

mod prediction;
mod text;

pub use prediction::{PredictionKind, PredictionStatus};
pub use text::{InlineCompletion, Position, Range};
