//! Exit code logic for the archive-fetch process.
//!
//! Single responsibility: map a run summary to the process exit outcome.

use archive_fetch::RunSummary;

use crate::ProcessExit;

/// Determines the process exit outcome from the final ledger summary.
pub(crate) fn determine_exit_outcome(summary: &RunSummary) -> ProcessExit {
    if summary.failure_count() == 0 {
        ProcessExit::Success
    } else if summary.success_count() > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}
