use std::path::PathBuf;

use serde::Serialize;

use crate::download::{FailureKind, FetchOutcome};
use crate::source::DownloadDescriptor;

/// Terminal outcome of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Retrieved and saved.
    Success {
        /// Where the resource was written.
        saved_to: PathBuf,
    },
    /// Gave up on this descriptor.
    Failure {
        /// Failure class.
        kind: FailureKind,
        /// Last error description.
        reason: String,
    },
}

/// One terminal attempt, as kept by the [`RunLedger`](super::RunLedger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    /// Locator as listed, before host normalization.
    pub locator: String,
    /// Target name the resource was (or would have been) saved under.
    pub target_name: String,
    /// Locator actually requested.
    pub resolved_locator: String,
    /// Network attempts spent.
    pub attempts: u32,
    /// Terminal outcome.
    pub outcome: AttemptOutcome,
}

impl AttemptRecord {
    /// Builds a record from a descriptor and the fetcher's outcome.
    #[must_use]
    pub fn from_fetch(
        descriptor: &DownloadDescriptor,
        resolved_locator: impl Into<String>,
        fetched: FetchOutcome,
    ) -> Self {
        let (attempts, outcome) = match fetched {
            FetchOutcome::Success { path, attempts } => {
                (attempts, AttemptOutcome::Success { saved_to: path })
            }
            FetchOutcome::Failure {
                kind,
                reason,
                attempts,
            } => (attempts, AttemptOutcome::Failure { kind, reason }),
        };
        Self {
            locator: descriptor.locator.clone(),
            target_name: descriptor.target_name.clone(),
            resolved_locator: resolved_locator.into(),
            attempts,
            outcome,
        }
    }

    /// True for successful records.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }

    /// Failure reason text, if this record is a failure.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            AttemptOutcome::Failure { reason, .. } => Some(reason),
            AttemptOutcome::Success { .. } => None,
        }
    }

    /// The descriptor this record was produced for.
    #[must_use]
    pub fn descriptor(&self) -> DownloadDescriptor {
        DownloadDescriptor::new(&self.locator, &self.target_name)
    }
}

/// Successes and failures of a run, derived from the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Successful records, in attempt order.
    pub successes: Vec<AttemptRecord>,
    /// Failed records, in attempt order.
    pub failures: Vec<AttemptRecord>,
}

impl RunSummary {
    /// Number of successes.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failures.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Total terminal attempts.
    #[must_use]
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}
