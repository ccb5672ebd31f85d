use serde::{Deserialize, Serialize};

/// Which completion strategy a prediction was created with.
///
/// Fixed at creation time; selects the postprocessing branch when the raw
/// model output is turned into an insertion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    /// Fill the middle of the current line at the cursor.
    SingleLineFillMiddle,
    /// Regenerate the remainder of the current line, replacing the old suffix.
    SingleLineRedoSuffix,
    /// Continue on a fresh line below the cursor (only right after an accept).
    MultiLineStartOnNextLine,
    /// No request should be issued for this context.
    DoNotPredict,
}

/// Lifecycle state of a prediction request.
///
/// `Pending -> Finished` on success, `Pending -> Error` on failure, timeout
/// or cancellation. Both end states are terminal; eviction from the cache is
/// not a state transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Pending,
    Finished,
    Error,
}

impl PredictionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PredictionStatus::Pending)
    }
}
