//! Run ledger: the terminal outcome of every descriptor attempted in a run.
//!
//! Records are appended and never edited. The only removals are a full
//! [`RunLedger::clear`] at the start of a fresh run and
//! [`RunLedger::replace_failure`] during a retry pass, which drops a failed
//! record in the same step that appends its new outcome. The ledger therefore
//! holds one record per attempted descriptor: its latest outcome.

mod record;

use tracing::debug;

use crate::source::DownloadDescriptor;

pub use record::{AttemptOutcome, AttemptRecord, RunSummary};

/// Append-only attempt history for the current run.
#[derive(Debug, Clone, Default)]
pub struct RunLedger {
    records: Vec<AttemptRecord>,
}

impl RunLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a terminal record.
    pub fn record(&mut self, record: AttemptRecord) {
        debug!(
            target_name = %record.target_name,
            success = record.is_success(),
            "attempt recorded"
        );
        self.records.push(record);
    }

    /// Splits the records into successes and failures, preserving order.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let (successes, failures) = self
            .records
            .iter()
            .cloned()
            .partition(AttemptRecord::is_success);
        RunSummary {
            successes,
            failures,
        }
    }

    /// Descriptors of every record currently marked as failed.
    #[must_use]
    pub fn failed_descriptors(&self) -> Vec<DownloadDescriptor> {
        self.records
            .iter()
            .filter(|r| !r.is_success())
            .map(AttemptRecord::descriptor)
            .collect()
    }

    /// Appends the new outcome of a retried descriptor and drops its earlier
    /// failure. Without a matching failure this is a plain [`record`](Self::record).
    pub fn replace_failure(&mut self, record: AttemptRecord) {
        let earlier = self.records.iter().position(|r| {
            !r.is_success() && r.locator == record.locator && r.target_name == record.target_name
        });
        if let Some(index) = earlier {
            self.records.remove(index);
        }
        self.record(record);
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// True when at least one record is a failure.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.records.iter().any(|r| !r.is_success())
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no attempt has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in attempt order.
    #[must_use]
    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::download::{FailureKind, FetchOutcome};

    fn success(n: u32) -> AttemptRecord {
        let descriptor = DownloadDescriptor::new(format!("https://a.example/{n}"), format!("{n}.json"));
        AttemptRecord::from_fetch(
            &descriptor,
            &descriptor.locator,
            FetchOutcome::Success {
                path: PathBuf::from(format!("/out/{n}.json")),
                attempts: 1,
            },
        )
    }

    fn failure(n: u32) -> AttemptRecord {
        let descriptor = DownloadDescriptor::new(format!("https://a.example/{n}"), format!("{n}.json"));
        AttemptRecord::from_fetch(
            &descriptor,
            &descriptor.locator,
            FetchOutcome::Failure {
                kind: FailureKind::TransientNetworkFailure,
                reason: "HTTP 503".to_string(),
                attempts: 3,
            },
        )
    }

    #[test]
    fn test_summary_partitions_in_order() {
        let mut ledger = RunLedger::new();
        ledger.record(success(1));
        ledger.record(failure(2));
        ledger.record(success(3));

        let summary = ledger.summary();

        assert_eq!(summary.success_count(), 2);
        assert_eq!(summary.failure_count(), 1);
        assert_eq!(summary.total(), ledger.len());
        assert_eq!(summary.successes[1].target_name, "3.json");
        assert_eq!(summary.failures[0].failure_reason(), Some("HTTP 503"));
    }

    #[test]
    fn test_failed_descriptors_lists_only_failures() {
        let mut ledger = RunLedger::new();
        ledger.record(success(1));
        ledger.record(failure(2));

        assert_eq!(
            ledger.failed_descriptors(),
            vec![DownloadDescriptor::new("https://a.example/2", "2.json")]
        );
        assert!(ledger.has_failures());
    }

    #[test]
    fn test_replace_failure_swaps_only_the_matching_record() {
        let mut ledger = RunLedger::new();
        ledger.record(failure(1));
        ledger.record(success(2));
        ledger.record(failure(3));

        ledger.replace_failure(success(1));

        assert_eq!(ledger.len(), 3);
        assert_eq!(
            ledger.failed_descriptors(),
            vec![DownloadDescriptor::new("https://a.example/3", "3.json")]
        );
        assert_eq!(ledger.records()[2].target_name, "1.json");
    }

    #[test]
    fn test_replace_failure_keeps_one_record_when_failing_again() {
        let mut ledger = RunLedger::new();
        ledger.record(failure(1));

        ledger.replace_failure(failure(1));

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.summary().failure_count(), 1);
    }

    #[test]
    fn test_clear_empties_ledger() {
        let mut ledger = RunLedger::new();
        ledger.record(failure(1));
        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.summary(), RunSummary::default());
    }

    #[test]
    fn test_record_serializes_with_status_tag() {
        let json = serde_json::to_value(failure(7)).unwrap();
        assert_eq!(json["outcome"]["status"], "failure");
        assert_eq!(json["outcome"]["kind"], "transient_network_failure");
        assert_eq!(json["targetName"], "7.json");
    }
}
