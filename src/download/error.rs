//! Error types for the download module.
//!
//! [`DownloadError`] carries the context of one failed attempt; [`FailureKind`]
//! is the coarse classification stored in the run ledger and used for retry
//! decisions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while retrieving or persisting a single resource.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx HTTP response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The locator is malformed or does not use a secure scheme.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl {
        /// The rejected locator.
        url: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The target name cannot be used as a file name.
    #[error("invalid target name {name:?}: {reason}")]
    InvalidTargetName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// File system error while saving the resource.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason,
        }
    }

    /// Creates an invalid target name error.
    pub fn invalid_target_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidTargetName {
            name: name.into(),
            reason,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the failure class of this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => {
                FailureKind::TransientNetworkFailure
            }
            Self::InvalidUrl { .. } | Self::InvalidTargetName { .. } => FailureKind::InvalidInput,
            Self::Io { .. } => FailureKind::PersistenceFailure,
        }
    }
}

/// Classification of a terminal per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed locator or target name; never retried.
    InvalidInput,
    /// Timeout, non-2xx status or transport error; retried up to the attempt limit.
    TransientNetworkFailure,
    /// The retrieved bytes could not be saved locally; not retried.
    PersistenceFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "invalid input"),
            Self::TransientNetworkFailure => write!(f, "network failure"),
            Self::PersistenceFailure => write!(f, "persistence failure"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://example.com/_api/archive/1");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/_api/archive/1"));
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/file.json", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected '503' in: {msg}");
        assert!(
            msg.contains("https://example.com/file.json"),
            "Expected URL in: {msg}"
        );
    }

    #[test]
    fn test_download_error_invalid_url_display() {
        let error = DownloadError::invalid_url("http://example.com", "must use https");
        let msg = error.to_string();
        assert!(msg.contains("invalid URL"), "Expected 'invalid URL' in: {msg}");
        assert!(msg.contains("must use https"), "Expected reason in: {msg}");
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/archive.json"), io_error);
        assert!(error.to_string().contains("/tmp/archive.json"));
    }

    #[test]
    fn test_kind_network_errors_are_transient() {
        assert_eq!(
            DownloadError::timeout("https://a.example").kind(),
            FailureKind::TransientNetworkFailure
        );
        assert_eq!(
            DownloadError::http_status("https://a.example", 404).kind(),
            FailureKind::TransientNetworkFailure
        );
    }

    #[test]
    fn test_kind_invalid_input() {
        assert_eq!(
            DownloadError::invalid_url("ftp://a", "must use https").kind(),
            FailureKind::InvalidInput
        );
        assert_eq!(
            DownloadError::invalid_target_name("", "empty").kind(),
            FailureKind::InvalidInput
        );
    }

    #[test]
    fn test_kind_io_is_persistence_failure() {
        let io_error = std::io::Error::other("disk full");
        assert_eq!(
            DownloadError::io("/tmp/x", io_error).kind(),
            FailureKind::PersistenceFailure
        );
    }

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::TransientNetworkFailure).unwrap();
        assert_eq!(json, "\"transient_network_failure\"");
    }
}
