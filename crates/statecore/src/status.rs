use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    NotStarted,
    Running,
    Finished,
    Cancelled,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::NotStarted => "not started",
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl RunStatus {
    /// Whether a new run may start without an explicit reset.
    pub fn accepts_run(self) -> bool {
        matches!(self, RunStatus::NotStarted | RunStatus::Finished | RunStatus::Cancelled)
    }
}
