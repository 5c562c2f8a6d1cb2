use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::ItemOutcome;
use crate::store::types::RunKey;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Completed,
    TimedOut,
    Failed,
}

/// Lifecycle of one run: `Fetching -> Running -> Done`, or
/// `Fetching -> Done` when the fetch fails or the deadline fires first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Fetching,
    Running,
    Done(RunStatus),
}

impl RunPhase {
    pub fn can_advance_to(self, next: RunPhase) -> bool {
        matches!(
            (self, next),
            (RunPhase::Fetching, RunPhase::Running)
                | (RunPhase::Fetching, RunPhase::Done(RunStatus::Failed))
                | (RunPhase::Fetching, RunPhase::Done(RunStatus::TimedOut))
                | (RunPhase::Running, RunPhase::Done(RunStatus::Completed))
                | (RunPhase::Running, RunPhase::Done(RunStatus::TimedOut))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunErrorKind {
    StoreError,
    RunTimeout,
}

/// Run-level failure attached to `Failed` and `TimedOut` results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub kind: RunErrorKind,
    pub message: String,
}

/// Externally visible result of one run.
///
/// Every fetched item is accounted for in exactly one of `outcomes`,
/// `abandoned` or `not_started`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub run_key: RunKey,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
    /// Length of the fetched list; 0 when the fetch did not complete.
    pub item_count: usize,
    /// In list order.
    pub outcomes: Vec<ItemOutcome>,
    pub abandoned: Vec<usize>,
    pub not_started: Vec<usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        use RunPhase::*;
        assert!(Fetching.can_advance_to(Running));
        assert!(Fetching.can_advance_to(Done(RunStatus::Failed)));
        assert!(Running.can_advance_to(Done(RunStatus::Completed)));
        assert!(Running.can_advance_to(Done(RunStatus::TimedOut)));

        assert!(!Fetching.can_advance_to(Done(RunStatus::Completed)));
        assert!(!Running.can_advance_to(Done(RunStatus::Failed)));
        assert!(!Done(RunStatus::Completed).can_advance_to(Running));
    }
}
