//! Best-effort run notifications.

use thiserror::Error;
use tracing::info;

/// A notification could not be delivered.
#[derive(Debug, Error)]
#[error("notification not delivered: {reason}")]
pub struct NotifyError {
    /// Why delivery failed.
    pub reason: String,
}

/// Delivers short notices about run milestones.
///
/// Callers ignore delivery failures.
pub trait Notifier: Send + Sync {
    /// Sends one notice.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when the notice could not be delivered.
    fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError>;
}

/// Routes notices to the `tracing` log at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        info!(target: "archive_fetch::notify", title, message, "notification");
        Ok(())
    }
}

/// Drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _title: &str, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}
