//! Progress UI (spinner) for archive runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use archive_fetch::StatusSnapshot;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_millis(100);

/// Starts the spinner when `use_spinner` is set.
///
/// The returned flag ends the spinner task once stored `true`; await the
/// handle afterwards so the line is cleared before the summary prints. With
/// the spinner off there is no task and the flag starts out `true`.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    status: watch::Receiver<StatusSnapshot>,
) -> (Option<JoinHandle<()>>, Arc<AtomicBool>) {
    let stop = Arc::new(AtomicBool::new(!use_spinner));
    let handle = use_spinner.then(|| tokio::spawn(run_spinner(status, Arc::clone(&stop))));
    (handle, stop)
}

async fn run_spinner(mut status: watch::Receiver<StatusSnapshot>, stop: Arc<AtomicBool>) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(TICK);
    spinner.set_message(status_line(&status.borrow_and_update()));

    let mut stop_check = tokio::time::interval(TICK);
    while !stop.load(Ordering::SeqCst) {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                spinner.set_message(status_line(&status.borrow_and_update()));
            }
            _ = stop_check.tick() => {}
        }
    }

    spinner.finish_and_clear();
}

fn status_line(snapshot: &StatusSnapshot) -> String {
    let progress = snapshot.progress;
    format!(
        "[page {} | {} ok | {} failed] {}",
        progress.pages_visited, progress.success_count, progress.failure_count, snapshot.message
    )
}
