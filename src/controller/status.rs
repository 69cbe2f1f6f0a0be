//! Shared status surface: state, counters, resume point and last summary.
//!
//! The board is the only place run state is written. Every transition and
//! every terminal per-item outcome is published on a watch channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use super::state::{ResumePoint, RunEnd, RunState};
use crate::ledger::{AttemptRecord, RunSummary};
use crate::notify::Notifier;
use crate::signal::{Interrupt, RunSignal};

/// Read-only progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Highest page number reached in the current run.
    pub pages_visited: u64,
    /// Successful downloads in the current run, retry passes included.
    pub success_count: u64,
    /// Failed downloads in the current run, retry passes included.
    pub failure_count: u64,
    /// True while a run task is executing.
    pub is_running: bool,
}

/// One update on the status channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Controller state at the time of the update.
    pub state: RunState,
    /// Counters at the time of the update.
    pub progress: Progress,
    /// Human-readable description of what just happened.
    pub message: String,
}

#[derive(Debug, Default)]
struct BoardState {
    state: RunState,
    pages_visited: u64,
    success_count: u64,
    failure_count: u64,
    resume: Option<ResumePoint>,
    signal: Option<RunSignal>,
    last_summary: Option<RunSummary>,
}

impl BoardState {
    fn progress(&self) -> Progress {
        Progress {
            pages_visited: self.pages_visited,
            success_count: self.success_count,
            failure_count: self.failure_count,
            is_running: self.state.is_active(),
        }
    }
}

pub(crate) struct StatusBoard {
    inner: Mutex<BoardState>,
    tx: watch::Sender<StatusSnapshot>,
    notifier: Arc<dyn Notifier>,
    notifications_enabled: bool,
}

impl StatusBoard {
    pub(crate) fn new(notifier: Arc<dyn Notifier>, notifications_enabled: bool) -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self {
            inner: Mutex::new(BoardState::default()),
            tx,
            notifier,
            notifications_enabled,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &BoardState, message: impl Into<String>) {
        let snapshot = StatusSnapshot {
            state: inner.state,
            progress: inner.progress(),
            message: message.into(),
        };
        debug!(state = %snapshot.state, message = %snapshot.message, "status");
        self.tx.send_replace(snapshot);
    }

    pub(crate) fn notify(&self, title: &str, message: &str) {
        if !self.notifications_enabled {
            return;
        }
        if let Err(e) = self.notifier.notify(title, message) {
            debug!(error = %e, "notification dropped");
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub(crate) fn state(&self) -> RunState {
        self.lock().state
    }

    pub(crate) fn progress(&self) -> Progress {
        self.lock().progress()
    }

    pub(crate) fn last_summary(&self) -> Option<RunSummary> {
        self.lock().last_summary.clone()
    }

    /// Moves to `Running`. Returns the resume point when the run continues a
    /// paused one; otherwise counters are reset.
    pub(crate) fn begin_run(&self, signal: RunSignal) -> Result<Option<ResumePoint>, RunState> {
        let mut inner = self.lock();
        if inner.state.is_active() {
            return Err(inner.state);
        }
        let resume = if inner.state == RunState::Idle {
            inner.resume.take()
        } else {
            None
        };
        inner.resume = None;
        if resume.is_none() {
            inner.pages_visited = 0;
            inner.success_count = 0;
            inner.failure_count = 0;
        }
        inner.state = RunState::Running;
        inner.signal = Some(signal);
        let message = match resume {
            Some(point) => format!(
                "Resuming at page {} item {}",
                point.page,
                point.next_index + 1
            ),
            None => "Starting run".to_string(),
        };
        self.publish(&inner, message);
        Ok(resume)
    }

    pub(crate) fn request_pause(&self) -> Result<(), RunState> {
        let mut inner = self.lock();
        if inner.state != RunState::Running {
            return Err(inner.state);
        }
        if let Some(signal) = &inner.signal {
            signal.request(Interrupt::Pause);
        }
        inner.state = RunState::PausedRequested;
        self.publish(&inner, "Pausing after current download");
        Ok(())
    }

    /// Signals a running run to stop, or discards the resume point of a paused one.
    ///
    /// A pending pause request keeps its `PausedRequested` state; only the
    /// signal is upgraded, and the run still settles in `Stopped`.
    pub(crate) fn request_stop(&self) -> Result<(), RunState> {
        let mut inner = self.lock();
        if inner.state.is_active() {
            if let Some(signal) = &inner.signal {
                signal.request(Interrupt::Stop);
            }
            self.publish(&inner, "Stopping after current download");
            return Ok(());
        }
        if inner.state == RunState::Idle && inner.resume.take().is_some() {
            inner.state = RunState::Stopped;
            self.publish(&inner, "Paused run discarded");
            return Ok(());
        }
        Err(inner.state)
    }

    pub(crate) fn enter_page(&self, page: u64) {
        let mut inner = self.lock();
        inner.pages_visited = inner.pages_visited.max(page);
        self.publish(&inner, format!("Processing page {page}"));
    }

    pub(crate) fn item_started(&self, target_name: &str) {
        let inner = self.lock();
        self.publish(&inner, format!("Downloading: {target_name}"));
    }

    pub(crate) fn record_outcome(&self, record: &AttemptRecord) {
        let mut inner = self.lock();
        let message = match record.failure_reason() {
            None => {
                inner.success_count += 1;
                format!("Downloaded: {}", record.target_name)
            }
            Some(reason) => {
                inner.failure_count += 1;
                format!("Failed: {} ({reason})", record.target_name)
            }
        };
        self.publish(&inner, message);
    }

    pub(crate) fn set_resume(&self, point: ResumePoint) {
        self.lock().resume = Some(point);
    }

    /// Settles the state after a run and publishes its summary.
    ///
    /// The notifier hears about the ending first; the summary snapshot is the
    /// last thing published.
    pub(crate) fn finish_run(&self, end: &RunEnd, summary: &RunSummary) {
        let counts = format!(
            "{} downloaded, {} failed",
            summary.success_count(),
            summary.failure_count()
        );
        let (title, message) = match end {
            RunEnd::Completed | RunEnd::NavigationEnded => {
                ("Run complete", format!("Reached the last page: {counts}"))
            }
            RunEnd::Stopped => ("Run stopped", format!("Stopped: {counts}")),
            RunEnd::Paused => ("Run paused", format!("Paused: {counts}. Start to resume")),
            RunEnd::Failed(reason) => ("Run failed", format!("Run ended on error ({reason}): {counts}")),
        };
        info!(state = %end.final_state(), "{message}");
        self.notify(title, &message);

        let mut inner = self.lock();
        inner.state = end.final_state();
        inner.signal = None;
        if *end != RunEnd::Paused {
            inner.resume = None;
        }
        inner.last_summary = Some(summary.clone());
        self.publish(&inner, message);
    }

    pub(crate) fn retry_pass_started(&self, count: usize) {
        let inner = self.lock();
        self.publish(&inner, format!("Retrying {count} failed downloads"));
    }

    pub(crate) fn finish_retry_pass(&self, succeeded: usize, failed: usize, summary: &RunSummary) {
        let message = format!("Retry complete. Success: {succeeded}, Failed: {failed}");
        info!("{message}");
        self.notify("Retry pass complete", &message);

        let mut inner = self.lock();
        inner.last_summary = Some(summary.clone());
        self.publish(&inner, message);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::SilentNotifier;

    fn board() -> StatusBoard {
        StatusBoard::new(Arc::new(SilentNotifier), false)
    }

    #[test]
    fn test_begin_run_rejects_active_state() {
        let board = board();
        board.begin_run(RunSignal::new()).unwrap();
        assert_eq!(board.begin_run(RunSignal::new()), Err(RunState::Running));
    }

    #[test]
    fn test_pause_only_from_running() {
        let board = board();
        assert_eq!(board.request_pause(), Err(RunState::Idle));
        board.begin_run(RunSignal::new()).unwrap();
        board.request_pause().unwrap();
        assert_eq!(board.state(), RunState::PausedRequested);
        assert_eq!(board.request_pause(), Err(RunState::PausedRequested));
    }

    #[test]
    fn test_pause_sets_signal() {
        let board = board();
        let signal = RunSignal::new();
        board.begin_run(signal.clone()).unwrap();
        board.request_pause().unwrap();
        assert_eq!(signal.requested(), Some(Interrupt::Pause));
    }

    #[test]
    fn test_stop_after_pause_request_upgrades_signal() {
        let board = board();
        let signal = RunSignal::new();
        board.begin_run(signal.clone()).unwrap();
        board.request_pause().unwrap();
        board.request_stop().unwrap();
        assert!(signal.is_stop_requested());
        assert_eq!(board.state(), RunState::PausedRequested);
        assert_eq!(board.subscribe().borrow().state, RunState::PausedRequested);

        board.finish_run(&RunEnd::Stopped, &RunSummary::default());
        assert_eq!(board.state(), RunState::Stopped);
    }

    /// Records the state observers could see when each notice went out.
    #[derive(Default)]
    struct StateAtNotice {
        status: Mutex<Option<watch::Receiver<StatusSnapshot>>>,
        seen: Mutex<Vec<RunState>>,
    }

    impl Notifier for StateAtNotice {
        fn notify(&self, _title: &str, _message: &str) -> Result<(), crate::notify::NotifyError> {
            if let Some(rx) = self.status.lock().unwrap().as_ref() {
                self.seen.lock().unwrap().push(rx.borrow().state);
            }
            Ok(())
        }
    }

    #[test]
    fn test_summary_is_published_after_notification() {
        let notifier = Arc::new(StateAtNotice::default());
        let board = StatusBoard::new(notifier.clone(), true);
        *notifier.status.lock().unwrap() = Some(board.subscribe());
        board.begin_run(RunSignal::new()).unwrap();

        board.finish_run(&RunEnd::Completed, &RunSummary::default());

        assert_eq!(*notifier.seen.lock().unwrap(), vec![RunState::Running]);
        let last = board.subscribe().borrow().clone();
        assert_eq!(last.state, RunState::Completed);
        assert!(last.message.starts_with("Reached the last page"), "{}", last.message);
    }

    #[test]
    fn test_resume_point_keeps_counters() {
        let board = board();
        board.begin_run(RunSignal::new()).unwrap();
        board.enter_page(2);
        board.set_resume(ResumePoint {
            page: 2,
            next_index: 1,
        });
        board.finish_run(&RunEnd::Paused, &RunSummary::default());
        assert_eq!(board.state(), RunState::Idle);

        let resume = board.begin_run(RunSignal::new()).unwrap();

        assert_eq!(
            resume,
            Some(ResumePoint {
                page: 2,
                next_index: 1
            })
        );
        assert_eq!(board.progress().pages_visited, 2);
    }

    #[test]
    fn test_stop_discards_paused_run() {
        let board = board();
        board.begin_run(RunSignal::new()).unwrap();
        board.set_resume(ResumePoint {
            page: 1,
            next_index: 0,
        });
        board.finish_run(&RunEnd::Paused, &RunSummary::default());

        board.request_stop().unwrap();

        assert_eq!(board.state(), RunState::Stopped);
        assert_eq!(board.begin_run(RunSignal::new()).unwrap(), None);
        assert_eq!(board.progress().pages_visited, 0);
    }

    #[test]
    fn test_subscribers_see_transitions() {
        let board = board();
        let rx = board.subscribe();
        board.begin_run(RunSignal::new()).unwrap();
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.state, RunState::Running);
        assert!(snapshot.progress.is_running);
    }
}
