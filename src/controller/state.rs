use std::fmt;

use serde::Serialize;

/// Controller state visible to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No run in progress. A paused run rests here until started again.
    #[default]
    Idle,
    /// The page loop is executing.
    Running,
    /// Pause requested; the loop leaves at its next check point.
    PausedRequested,
    /// The last run was stopped or ended on an unexpected error.
    Stopped,
    /// The last run walked every page.
    Completed,
}

impl RunState {
    /// True while a run task owns the session.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::PausedRequested)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::PausedRequested => "pausing",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Why the page loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEnd {
    /// The page source reported no further page.
    Completed,
    /// The page source could not advance; treated as the end of the listing.
    NavigationEnded,
    /// A stop request was observed.
    Stopped,
    /// A pause request was observed.
    Paused,
    /// The loop hit an unexpected error.
    Failed(String),
}

impl RunEnd {
    /// State the controller settles in after this ending.
    #[must_use]
    pub fn final_state(&self) -> RunState {
        match self {
            Self::Completed | Self::NavigationEnded => RunState::Completed,
            Self::Stopped | Self::Failed(_) => RunState::Stopped,
            Self::Paused => RunState::Idle,
        }
    }
}

/// Where a paused run picks up: page number and index of the next descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    /// One-based page number.
    pub page: u64,
    /// Zero-based index of the first descriptor not yet attempted.
    pub next_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_end_final_states() {
        assert_eq!(RunEnd::Completed.final_state(), RunState::Completed);
        assert_eq!(RunEnd::NavigationEnded.final_state(), RunState::Completed);
        assert_eq!(RunEnd::Stopped.final_state(), RunState::Stopped);
        assert_eq!(
            RunEnd::Failed("boom".to_string()).final_state(),
            RunState::Stopped
        );
        assert_eq!(RunEnd::Paused.final_state(), RunState::Idle);
    }

    #[test]
    fn test_run_state_is_active() {
        assert!(RunState::Running.is_active());
        assert!(RunState::PausedRequested.is_active());
        assert!(!RunState::Idle.is_active());
        assert!(!RunState::Completed.is_active());
    }
}
