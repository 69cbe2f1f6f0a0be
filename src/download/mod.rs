//! Per-resource retrieval: HTTP client, retry policy, local persistence and
//! the [`ResilientFetcher`] that ties them together.
//!
//! # Features
//!
//! - One GET per attempt with a fixed 30 second timeout
//! - Fixed-delay bounded retry for transient network failures only
//! - Atomic temp-file + rename saves into an output directory
//! - `{prefix}_{YYYY-MM-DD}.json` target names derived from row dates
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use archive_fetch::RunSignal;
//! use archive_fetch::download::{DirectoryStore, HttpClient, ResilientFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = ResilientFetcher::new(
//!     Arc::new(HttpClient::new()?),
//!     Arc::new(DirectoryStore::new("./archives")),
//! );
//! let outcome = fetcher
//!     .fetch(
//!         "https://stake.us/_api/archive/1",
//!         "archive_2024-01-01.json",
//!         3,
//!         &RunSignal::new(),
//!     )
//!     .await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod fetcher;
pub mod filename;
mod persistence;
mod retry;

pub use client::{HttpClient, ResourceClient};
pub use constants::{DEFAULT_RETRY_DELAY, REQUEST_TIMEOUT_SECS, USER_AGENT};
pub use error::{DownloadError, FailureKind};
pub use fetcher::{FetchOutcome, ResilientFetcher};
pub use filename::{DateStamp, ERROR_DATE, INVALID_DATE, target_name_for};
pub use persistence::{DirectoryStore, Persistence};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy};

// Note: no module-local Result aliases. Use `Result<T, DownloadError>` explicitly.
