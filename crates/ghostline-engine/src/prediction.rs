use ghostline_protocol::{PredictionKind, PredictionStatus};
use ghostline_providers::CancelToken;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// A single prediction request and its lifecycle state.
///
/// Creation-time fields never mutate; only the state behind the mutex does.
/// The state machine is `Pending -> Finished` or `Pending -> Error`, both
/// terminal. A fixed wall-clock deadline forces `Error` if the request is
/// still pending when it passes, independent of the provider's own timeout.
pub struct Prediction {
    pub id: u64,
    /// Buffer text before the cursor at creation time.
    pub prefix: String,
    /// Buffer text after the cursor at creation time.
    pub suffix: String,
    /// The (windowed) text actually sent to the model.
    pub model_prefix: String,
    pub model_suffix: String,
    pub kind: PredictionKind,
    pub created_at: Instant,
    deadline: Instant,
    cancel: CancelToken,
    state: Mutex<State>,
    done: Notify,
}

#[derive(Debug)]
struct State {
    status: PredictionStatus,
    inserted_text: String,
    completed_at: Option<Instant>,
    newline_budget_used: usize,
    shown_prefix: Option<String>,
}

/// Terminal snapshot of a prediction's mutable state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub status: PredictionStatus,
    pub inserted_text: String,
    pub completed_at: Option<Instant>,
    pub newline_budget_used: usize,
    /// Normalized buffer prefix that accepting the last shown text would
    /// produce, if anything was shown.
    pub shown_prefix: Option<String>,
}

impl Prediction {
    pub fn new(
        id: u64,
        prefix: String,
        suffix: String,
        model_prefix: String,
        model_suffix: String,
        kind: PredictionKind,
        timeout: Duration,
    ) -> Self {
        let created_at = Instant::now();
        Self {
            id,
            prefix,
            suffix,
            model_prefix,
            model_suffix,
            kind,
            created_at,
            deadline: created_at + timeout,
            cancel: CancelToken::new(),
            state: Mutex::new(State {
                status: PredictionStatus::Pending,
                inserted_text: String::new(),
                completed_at: None,
                newline_budget_used: 0,
                shown_prefix: None,
            }),
            done: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // No code panics while holding the lock.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> PredictionStatus {
        self.state().status
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state();
        Snapshot {
            status: state.status,
            inserted_text: state.inserted_text.clone(),
            completed_at: state.completed_at,
            newline_budget_used: state.newline_budget_used,
            shown_prefix: state.shown_prefix.clone(),
        }
    }

    /// Record the normalized buffer prefix that accepting the text just
    /// shown would produce. Postprocessing may shorten the stored
    /// insertion, so acceptance detection needs the shown form too.
    pub fn note_shown(&self, shown_prefix: String) {
        self.state().shown_prefix = Some(shown_prefix);
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Latency from creation to completion, once terminal.
    pub fn latency(&self) -> Option<Duration> {
        self.state()
            .completed_at
            .map(|at| at.duration_since(self.created_at))
    }

    /// Transition `Pending -> Finished`. No-op once terminal, so a late
    /// result for an already timed-out prediction resolves nothing twice.
    pub fn finish(&self, inserted_text: String, newline_budget_used: usize) {
        {
            let mut state = self.state();
            if state.status.is_terminal() {
                return;
            }
            state.status = PredictionStatus::Finished;
            state.inserted_text = inserted_text;
            state.completed_at = Some(Instant::now());
            state.newline_budget_used = newline_budget_used;
        }
        self.done.notify_waiters();
    }

    /// Transition `Pending -> Error` (failure, timeout or cancellation).
    /// No-op once terminal.
    pub fn fail(&self) {
        {
            let mut state = self.state();
            if state.status.is_terminal() {
                return;
            }
            state.status = PredictionStatus::Error;
            state.completed_at = Some(Instant::now());
        }
        self.done.notify_waiters();
    }

    /// Cancel the underlying request. Idempotent; cancelling a finished
    /// prediction is a no-op. Invoked by the cache disposal hook.
    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    /// Wait until the prediction reaches a terminal state, bounded by its
    /// own deadline. Passing the deadline forces `Error`.
    pub async fn await_terminal(&self) -> PredictionStatus {
        loop {
            let status = self.status();
            if status.is_terminal() {
                return status;
            }
            let notified = self.done.notified();
            // Re-check after arming the waiter so a transition racing the
            // check above is not missed.
            let status = self.status();
            if status.is_terminal() {
                return status;
            }
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.fail();
                return PredictionStatus::Error;
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                self.fail();
                return PredictionStatus::Error;
            }
        }
    }
}
