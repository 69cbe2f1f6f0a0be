//! Retrieval controller: the run state machine.
//!
//! ```text
//! Idle ──start──▶ Running ──no next page──▶ Completed
//!                   │  └────stop──────────▶ Stopped
//!                   └─pause─▶ PausedRequested ──▶ Idle (resume point kept)
//! ```
//!
//! One run at a time. [`RetrievalController::start`] hands the session to a
//! spawned task and returns immediately; pause and stop are sampled by that
//! task at its check points. Whatever ends the loop, the run summary is the
//! last thing published.

mod run_loop;
mod state;
mod status;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::download::ResilientFetcher;
use crate::ledger::{RunLedger, RunSummary};
use crate::normalize::DomainNormalizer;
use crate::notify::{LogNotifier, Notifier};
use crate::settings::Settings;
use crate::signal::RunSignal;
use crate::source::{DownloadDescriptor, PageSource};

use run_loop::Session;
use status::StatusBoard;

pub use state::{ResumePoint, RunEnd, RunState};
pub use status::{Progress, StatusSnapshot};

/// Errors returned by controller operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    /// A run is already in progress.
    #[error("a run is already in progress ({0})")]
    AlreadyRunning(RunState),

    /// The operation needs a running run.
    #[error("no run in progress (state: {0})")]
    NotRunning(RunState),

    /// A retry pass currently holds the session.
    #[error("controller is busy with a retry pass")]
    Busy,
}

/// Loop tuning taken from [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Network attempts per descriptor.
    pub max_attempts: u32,
    /// Wait between descriptors of a page.
    pub inter_item_delay: Duration,
    /// Wait between pages.
    pub inter_page_delay: Duration,
    /// Whether milestones go to the notifier.
    pub notifications_enabled: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ControllerConfig {
    /// Builds the loop configuration from stored settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_attempts: settings.max_retries,
            inter_item_delay: settings.inter_download_delay(),
            inter_page_delay: settings.inter_page_delay(),
            notifications_enabled: settings.notifications_enabled,
        }
    }
}

/// Result of [`RetrievalController::retry_failed_only`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    /// Descriptors that succeeded this pass.
    pub succeeded: usize,
    /// Descriptors that failed again.
    pub failed: usize,
    /// Ledger summary after the pass.
    pub summary: RunSummary,
}

impl RetryReport {
    /// True when the pass had nothing to retry.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.succeeded == 0 && self.failed == 0
    }
}

/// Handle to a started run.
#[derive(Debug)]
pub struct RunHandle {
    join: Option<JoinHandle<RunSummary>>,
    summary: Option<RunSummary>,
}

impl RunHandle {
    /// Waits for the run to leave its loop and returns its summary.
    ///
    /// Cancel safe; once the run has finished, later calls return the same
    /// summary immediately.
    pub async fn wait(&mut self) -> RunSummary {
        if let Some(join) = self.join.as_mut() {
            let summary = match join.await {
                Ok(summary) => summary,
                Err(e) => {
                    error!(error = %e, "run supervisor task failed");
                    RunSummary::default()
                }
            };
            self.join = None;
            self.summary = Some(summary);
        }
        self.summary.clone().unwrap_or_default()
    }

    /// True once the run has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

/// Owns the page source, fetcher, normalizer and ledger, and drives runs over them.
pub struct RetrievalController {
    session: Arc<Mutex<Session>>,
    board: Arc<StatusBoard>,
}

impl RetrievalController {
    /// Creates an idle controller that logs notifications.
    #[must_use]
    pub fn new(
        source: Box<dyn PageSource>,
        fetcher: ResilientFetcher,
        normalizer: DomainNormalizer,
        config: ControllerConfig,
    ) -> Self {
        let board = StatusBoard::new(Arc::new(LogNotifier), config.notifications_enabled);
        Self {
            session: Arc::new(Mutex::new(Session {
                source,
                fetcher,
                normalizer,
                ledger: RunLedger::new(),
                config,
            })),
            board: Arc::new(board),
        }
    }

    /// Replaces the notifier. Only meaningful before the first run.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        let enabled = self
            .session
            .try_lock()
            .map_or(true, |session| session.config.notifications_enabled);
        self.board = Arc::new(StatusBoard::new(notifier, enabled));
        self
    }

    /// Starts a run, or resumes a paused one, on a background task.
    ///
    /// A fresh run (from `Idle` without a resume point, `Stopped` or
    /// `Completed`) clears the ledger and counters and rewinds the page source.
    ///
    /// # Errors
    ///
    /// [`ControllerError::AlreadyRunning`] while a run is active and
    /// [`ControllerError::Busy`] while a retry pass holds the session.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<RunHandle, ControllerError> {
        let state = self.board.state();
        if state.is_active() {
            return Err(ControllerError::AlreadyRunning(state));
        }
        let mut guard = Arc::clone(&self.session)
            .try_lock_owned()
            .map_err(|_| ControllerError::Busy)?;

        let signal = RunSignal::new();
        let resume = self
            .board
            .begin_run(signal.clone())
            .map_err(ControllerError::AlreadyRunning)?;
        if resume.is_none() {
            guard.ledger.clear();
        }
        info!(resume = ?resume, "run started");
        self.board.notify("Run started", "Archive download started");

        let board = Arc::clone(&self.board);
        let session = Arc::clone(&self.session);
        let run_board = Arc::clone(&self.board);
        let inner = tokio::spawn(async move {
            guard.run_pages(&signal, &run_board, resume).await
        });

        let join = tokio::spawn(async move {
            let end = match inner.await {
                Ok(end) => end,
                Err(e) => {
                    error!(error = %e, "run task aborted");
                    RunEnd::Failed(format!("run task aborted: {e}"))
                }
            };
            let summary = session.lock().await.ledger.summary();
            board.finish_run(&end, &summary);
            summary
        });

        Ok(RunHandle {
            join: Some(join),
            summary: None,
        })
    }

    /// Asks the running run to pause at its next check point.
    ///
    /// # Errors
    ///
    /// [`ControllerError::NotRunning`] unless the state is `Running`.
    pub fn pause(&self) -> Result<(), ControllerError> {
        self.board
            .request_pause()
            .map_err(ControllerError::NotRunning)
    }

    /// Asks the running run to stop at its next check point. On a paused run,
    /// discards the resume point and settles in `Stopped`.
    ///
    /// # Errors
    ///
    /// [`ControllerError::NotRunning`] when there is nothing to stop.
    pub fn stop(&self) -> Result<(), ControllerError> {
        self.board.request_stop().map_err(ControllerError::NotRunning)
    }

    /// Re-attempts only the descriptors whose latest outcome is a failure.
    ///
    /// Each failed entry is replaced by its new outcome as that outcome is
    /// recorded. Dropping the future part-way leaves every descriptor not yet
    /// re-attempted in the ledger as a failure. With no failures this is a
    /// no-op that changes nothing. The run state is left as it was; counters
    /// keep growing.
    ///
    /// # Errors
    ///
    /// [`ControllerError::AlreadyRunning`] while a run is active and
    /// [`ControllerError::Busy`] while another retry pass is in progress.
    #[instrument(skip(self))]
    pub async fn retry_failed_only(&self) -> Result<RetryReport, ControllerError> {
        let state = self.board.state();
        if state.is_active() {
            return Err(ControllerError::AlreadyRunning(state));
        }
        let mut session = Arc::clone(&self.session)
            .try_lock_owned()
            .map_err(|_| ControllerError::Busy)?;

        if !session.ledger.has_failures() {
            info!("no failed downloads to retry");
            return Ok(RetryReport {
                summary: session.ledger.summary(),
                ..RetryReport::default()
            });
        }

        let descriptors = session.ledger.failed_descriptors();
        self.board.retry_pass_started(descriptors.len());
        let counts = session.retry(descriptors, &self.board).await;
        let summary = session.ledger.summary();
        self.board
            .finish_retry_pass(counts.succeeded, counts.failed, &summary);

        Ok(RetryReport {
            succeeded: counts.succeeded,
            failed: counts.failed,
            summary,
        })
    }

    /// Current counters.
    #[must_use]
    pub fn progress(&self) -> Progress {
        self.board.progress()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.board.state()
    }

    /// Receiver for status updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.board.subscribe()
    }

    /// Summary published at the end of the last run or retry pass.
    #[must_use]
    pub fn last_summary(&self) -> Option<RunSummary> {
        self.board.last_summary()
    }

    /// Descriptors whose latest outcome is a failure.
    ///
    /// # Errors
    ///
    /// [`ControllerError::Busy`] while a run or retry pass holds the session.
    pub fn failed_descriptors(&self) -> Result<Vec<DownloadDescriptor>, ControllerError> {
        self.session
            .try_lock()
            .map(|session| session.ledger.failed_descriptors())
            .map_err(|_| ControllerError::Busy)
    }

    /// Current ledger summary.
    ///
    /// # Errors
    ///
    /// [`ControllerError::Busy`] while a run or retry pass holds the session.
    pub fn summary(&self) -> Result<RunSummary, ControllerError> {
        self.session
            .try_lock()
            .map(|session| session.ledger.summary())
            .map_err(|_| ControllerError::Busy)
    }
}

impl std::fmt::Debug for RetrievalController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalController")
            .field("state", &self.board.state())
            .field("progress", &self.board.progress())
            .finish_non_exhaustive()
    }
}
