//! Single-resource retrieval with bounded, fixed-delay retry.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::ResourceClient;
use super::constants::{DEFAULT_RETRY_DELAY, REQUEST_TIMEOUT_SECS};
use super::error::{DownloadError, FailureKind};
use super::filename::validate_target_name;
use super::persistence::Persistence;
use super::retry::{RetryDecision, RetryPolicy};
use crate::signal::RunSignal;

/// Terminal result of one [`ResilientFetcher::fetch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The resource was retrieved and saved.
    Success {
        /// Where the resource was written.
        path: PathBuf,
        /// Network attempts used, including the successful one.
        attempts: u32,
    },
    /// The resource could not be retrieved or saved.
    Failure {
        /// Failure class of the last error.
        kind: FailureKind,
        /// Description of the last error.
        reason: String,
        /// Network attempts made; zero when the input was rejected up front.
        attempts: u32,
    },
}

impl FetchOutcome {
    /// Returns true for [`FetchOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Number of network attempts made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => *attempts,
        }
    }

    fn failure(error: &DownloadError, attempts: u32) -> Self {
        Self::Failure {
            kind: error.kind(),
            reason: error.to_string(),
            attempts,
        }
    }
}

/// Downloads one resource and hands it to [`Persistence`].
///
/// The fetcher never touches the run ledger; the controller records its
/// outcome. Errors never escape `fetch`, they are folded into [`FetchOutcome`].
#[derive(Clone)]
pub struct ResilientFetcher {
    client: Arc<dyn ResourceClient>,
    store: Arc<dyn Persistence>,
    retry_delay: Duration,
    attempt_timeout: Duration,
}

impl std::fmt::Debug for ResilientFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientFetcher")
            .field("retry_delay", &self.retry_delay)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish_non_exhaustive()
    }
}

impl ResilientFetcher {
    /// Creates a fetcher with the default 1 second retry delay and 30 second attempt timeout.
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>, store: Arc<dyn Persistence>) -> Self {
        Self {
            client,
            store,
            retry_delay: DEFAULT_RETRY_DELAY,
            attempt_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Sets the fixed wait between attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the timeout applied to each attempt.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Retrieves `locator` and saves it as `target_name`.
    ///
    /// Makes at most `max_attempts` network attempts (at least one). Only
    /// transient network failures are retried. A stop request observed between
    /// attempts abandons the remaining retries; a pause request does not.
    #[instrument(skip(self, signal), fields(locator = %locator, target_name = %target_name))]
    pub async fn fetch(
        &self,
        locator: &str,
        target_name: &str,
        max_attempts: u32,
        signal: &RunSignal,
    ) -> FetchOutcome {
        if let Err(error) = check_inputs(locator, target_name) {
            warn!(error = %error, "rejected before any network attempt");
            return FetchOutcome::failure(&error, 0);
        }

        let policy = RetryPolicy::new(max_attempts, self.retry_delay);
        let mut attempt = 1;
        loop {
            let error = match self.attempt(locator).await {
                Ok(bytes) => {
                    return match self.store.save(&bytes, target_name).await {
                        Ok(path) => {
                            info!(attempt, path = %path.display(), "download succeeded");
                            FetchOutcome::Success {
                                path,
                                attempts: attempt,
                            }
                        }
                        Err(error) => {
                            warn!(attempt, error = %error, "save failed");
                            FetchOutcome::failure(&error, attempt)
                        }
                    };
                }
                Err(error) => error,
            };

            match policy.should_retry(error.kind(), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    if signal.is_stop_requested() {
                        info!(attempt, "run stopped, abandoning retries");
                        return FetchOutcome::failure(&error, attempt);
                    }
                    debug!(attempt, error = %error, ?delay, "attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    if signal.is_stop_requested() {
                        info!(attempt, "run stopped, abandoning retries");
                        return FetchOutcome::failure(&error, attempt);
                    }
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(attempt, error = %error, %reason, "download failed");
                    return FetchOutcome::failure(&error, attempt);
                }
            }
        }
    }

    async fn attempt(&self, locator: &str) -> Result<Vec<u8>, DownloadError> {
        match tokio::time::timeout(self.attempt_timeout, self.client.get_bytes(locator)).await {
            Ok(result) => result,
            Err(_) => Err(DownloadError::timeout(locator)),
        }
    }
}

fn check_inputs(locator: &str, target_name: &str) -> Result<(), DownloadError> {
    let url = Url::parse(locator).map_err(|_| DownloadError::invalid_url(locator, "unparseable"))?;
    if url.scheme() != "https" {
        return Err(DownloadError::invalid_url(locator, "must use https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(DownloadError::invalid_url(locator, "missing host"));
    }
    validate_target_name(target_name)
}
