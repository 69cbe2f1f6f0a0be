//! CLI output formatting and display helpers.

use std::path::Path;

use archive_fetch::{AttemptOutcome, FailureKind, Progress, RetryReport, RunState, RunSummary};
use tracing::info;

/// Commands accepted on stdin while a run is in progress.
pub const INTERACTIVE_HELP: &str =
    "Commands: pause | resume | stop | retry | status | help (Ctrl-C stops the run)";

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let text_len = text.chars().count();
    if text_len <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    if width == 1 {
        return "…".to_string();
    }

    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

pub(crate) fn render_status_line(state: RunState, progress: &Progress) -> String {
    format!(
        "State: {state}. Pages visited: {}. Downloaded: {}. Failed: {}.",
        progress.pages_visited, progress.success_count, progress.failure_count
    )
}

pub(crate) fn render_retry_report_line(report: &RetryReport) -> String {
    if report.is_noop() {
        return "No failed downloads to retry.".to_string();
    }
    format!(
        "Retry complete. Success: {}, Failed: {}",
        report.succeeded, report.failed
    )
}

/// Lines listing every failed download with its reason, grouped by failure kind.
pub(crate) fn render_failure_summary_lines(summary: &RunSummary, width: usize) -> Vec<String> {
    if summary.failures.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![truncate_to_width("Failed downloads:", width)];
    for kind in [
        FailureKind::TransientNetworkFailure,
        FailureKind::PersistenceFailure,
        FailureKind::InvalidInput,
    ] {
        let failures: Vec<(&str, &str)> = summary
            .failures
            .iter()
            .filter_map(|record| match &record.outcome {
                AttemptOutcome::Failure {
                    kind: failed_kind,
                    reason,
                } if *failed_kind == kind => Some((record.target_name.as_str(), reason.as_str())),
                _ => None,
            })
            .collect();
        if failures.is_empty() {
            continue;
        }
        lines.push(truncate_to_width(
            &format!("- {kind}: {}", failures.len()),
            width,
        ));
        for (target_name, reason) in failures {
            lines.push(truncate_to_width(
                &format!("    {target_name}: {reason}"),
                width,
            ));
        }
    }
    lines
}

pub(crate) fn print_run_summary(
    state: RunState,
    progress: &Progress,
    summary: &RunSummary,
    output_dir: &Path,
) {
    info!(
        state = %state,
        succeeded = summary.success_count(),
        failed = summary.failure_count(),
        pages = progress.pages_visited,
        output_dir = %output_dir.display(),
        "Run summary"
    );

    let label = if state == RunState::Idle {
        "paused".to_string()
    } else {
        state.to_string()
    };
    println!(
        "Run {label}: {} downloaded, {} failed, {} pages visited.",
        summary.success_count(),
        summary.failure_count(),
        progress.pages_visited
    );
    for line in render_failure_summary_lines(summary, terminal_width()) {
        println!("{line}");
    }
}
