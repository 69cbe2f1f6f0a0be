//! Page sources: where the controller gets each page's descriptors from.
//!
//! The controller only knows the [`PageSource`] trait. [`HtmlListingSource`]
//! scrapes a live paginated listing; [`StaticPageSource`] replays pages that
//! are already known (a JSON manifest, or pages built in memory).

mod descriptor;
mod html;
mod static_source;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::download::DownloadError;

pub use descriptor::DownloadDescriptor;
pub use html::{HtmlListingSource, ParsedPage, parse_listing};
pub use static_source::StaticPageSource;

/// Supplies descriptors one page at a time.
///
/// The controller never learns the page count in advance; it asks for the
/// current page, then whether there is another, then advances.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Descriptors on the current page, in listing order.
    async fn current_page_descriptors(&mut self) -> Result<Vec<DownloadDescriptor>, PageSourceError>;

    /// Whether a page follows the current one.
    async fn has_next_page(&mut self) -> Result<bool, PageSourceError>;

    /// Moves to the next page. Returns `false` when navigation did not happen.
    async fn advance_page(&mut self) -> Result<bool, PageSourceError>;

    /// Returns to the first page before a fresh run. Sources that cannot
    /// rewind keep their position.
    async fn rewind(&mut self) -> Result<(), PageSourceError> {
        Ok(())
    }
}

/// Errors raised by page sources.
#[derive(Debug, Error)]
pub enum PageSourceError {
    /// The listing page could not be retrieved.
    #[error("failed to load listing page {url}: {source}")]
    Fetch {
        /// Listing page URL.
        url: String,
        /// Underlying retrieval error.
        #[source]
        source: DownloadError,
    },

    /// A listing or pagination URL could not be parsed.
    #[error("invalid listing URL {url:?}: {source}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// The manifest file could not be read.
    #[error("cannot read manifest {path}: {source}")]
    ManifestIo {
        /// Manifest path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest file is not a list of pages of descriptors.
    #[error("malformed manifest {path}: {source}")]
    ManifestFormat {
        /// Manifest path.
        path: PathBuf,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl PageSourceError {
    /// Creates a listing fetch error.
    pub fn fetch(url: impl Into<String>, source: DownloadError) -> Self {
        Self::Fetch {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            source,
        }
    }
}
