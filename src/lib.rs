//! Archive Fetch Core Library
//!
//! Walks a paginated listing of downloadable archives, saves each one under a
//! date-derived name, and keeps a per-run ledger of what succeeded and what
//! failed so that only the failures need to be tried again.
//!
//! # Architecture
//!
//! - [`controller`] - Run state machine: start, pause, stop, retry failed only
//! - [`download`] - Resilient fetcher, HTTP client, persistence and file naming
//! - [`normalize`] - Mirror host rewriting to one canonical host
//! - [`ledger`] - Per-run record of every descriptor outcome
//! - [`source`] - Page sources: live HTML listing or a JSON manifest
//! - [`settings`] - Persisted operator settings
//! - [`notify`] - Run milestone announcements
//! - [`signal`] - Pause and stop requests shared with a running task

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod controller;
pub mod download;
pub mod ledger;
pub mod normalize;
pub mod notify;
pub mod settings;
pub mod signal;
pub mod source;

// Re-export commonly used types
pub use controller::{
    ControllerConfig, ControllerError, Progress, RetrievalController, RetryReport, RunEnd,
    RunHandle, RunState, StatusSnapshot,
};
pub use download::{
    DirectoryStore, DownloadError, FailureKind, FetchOutcome, HttpClient, Persistence,
    ResilientFetcher, ResourceClient, target_name_for,
};
pub use ledger::{AttemptOutcome, AttemptRecord, RunLedger, RunSummary};
pub use normalize::{DEFAULT_MIRROR_HOSTS, DomainNormalizer};
pub use notify::{LogNotifier, Notifier, SilentNotifier};
pub use settings::{JsonSettingsStore, Settings, SettingsError, SettingsStore};
pub use signal::{Interrupt, RunSignal};
pub use source::{DownloadDescriptor, HtmlListingSource, PageSource, StaticPageSource};
