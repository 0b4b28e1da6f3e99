//! Edge-triggered job completion detection.

#![allow(missing_docs)]

/// Outcome of comparing two consecutive job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    JobFinished,
}

/// Detects the change *into* the finished state.
///
/// The first observed state is never a transition, and repeated finished
/// states fire only once because the state must also differ from the
/// previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionDetector {
    finished_state: String,
}

/// Job state tag the printer firmware reports at the end of a print.
pub const DEFAULT_FINISHED_STATE: &str = "FINISH";

impl TransitionDetector {
    #[must_use]
    pub fn new(finished_state: impl Into<String>) -> Self {
        Self {
            finished_state: finished_state.into(),
        }
    }

    #[must_use]
    pub fn finished_state(&self) -> &str {
        &self.finished_state
    }

    #[must_use]
    pub fn detect(&self, previous: Option<&str>, current: &str) -> Transition {
        detect(previous, current, &self.finished_state)
    }
}

impl Default for TransitionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_FINISHED_STATE)
    }
}

/// `JobFinished` iff `previous` is known, differs from `current`, and
/// `current` is the finished state.
#[must_use]
pub fn detect(previous: Option<&str>, current: &str, finished_state: &str) -> Transition {
    match previous {
        Some(prev) if prev != current && current == finished_state => Transition::JobFinished,
        _ => Transition::None,
    }
}
