//! Cooperative run signal shared between the controller and its run task.
//!
//! A [`RunSignal`] is a cancellation token that also remembers why it fired.
//! The run loop samples it at fixed check points; delays race it so a
//! signalled run does not sit out a full inter-item or inter-page wait.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

const NONE: u8 = 0;
const PAUSE: u8 = 1;
const STOP: u8 = 2;

/// Why a run was asked to leave its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Leave at the next check point and remember where to resume.
    Pause,
    /// Leave at the next check point and abandon any pending retries.
    Stop,
}

/// Cancellation token plus the reason it was cancelled.
///
/// Clones share state. A stop request overrides an earlier pause request, never
/// the other way round.
#[derive(Debug, Clone, Default)]
pub struct RunSignal {
    token: CancellationToken,
    reason: Arc<AtomicU8>,
}

impl RunSignal {
    /// Creates an unsignalled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `interrupt` and cancels the token.
    pub fn request(&self, interrupt: Interrupt) {
        let code = match interrupt {
            Interrupt::Pause => PAUSE,
            Interrupt::Stop => STOP,
        };
        self.reason.fetch_max(code, Ordering::SeqCst);
        self.token.cancel();
    }

    /// Returns the pending interrupt, if any.
    #[must_use]
    pub fn requested(&self) -> Option<Interrupt> {
        match self.reason.load(Ordering::SeqCst) {
            NONE => None,
            PAUSE => Some(Interrupt::Pause),
            _ => Some(Interrupt::Stop),
        }
    }

    /// Returns true once a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.requested() == Some(Interrupt::Stop)
    }

    /// Sleeps for `duration`, returning early if the signal fires.
    pub async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => {}
            () = self.token.cancelled() => {}
        }
    }
}
