use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{DownloadDescriptor, PageSource, PageSourceError};

/// Page source over pages known up front.
///
/// The manifest format is a JSON array of pages, each an array of
/// `{"locator": .., "targetName": ..}` objects.
#[derive(Debug, Clone, Default)]
pub struct StaticPageSource {
    pages: Vec<Vec<DownloadDescriptor>>,
    current: usize,
}

impl StaticPageSource {
    /// Creates a source positioned on the first of `pages`.
    #[must_use]
    pub fn new(pages: Vec<Vec<DownloadDescriptor>>) -> Self {
        Self { pages, current: 0 }
    }

    /// Loads pages from a JSON manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`PageSourceError::ManifestIo`] when the file cannot be read and
    /// [`PageSourceError::ManifestFormat`] when it does not parse.
    #[instrument(level = "debug", fields(path = %path.display()))]
    pub async fn from_manifest(path: &Path) -> Result<Self, PageSourceError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PageSourceError::ManifestIo {
                path: path.to_path_buf(),
                source,
            })?;
        let pages: Vec<Vec<DownloadDescriptor>> =
            serde_json::from_str(&raw).map_err(|source| PageSourceError::ManifestFormat {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(pages = pages.len(), "manifest loaded");
        Ok(Self::new(pages))
    }

    /// Total number of pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Zero-based index of the current page.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }
}

#[async_trait]
impl PageSource for StaticPageSource {
    async fn current_page_descriptors(&mut self) -> Result<Vec<DownloadDescriptor>, PageSourceError> {
        Ok(self.pages.get(self.current).cloned().unwrap_or_default())
    }

    async fn has_next_page(&mut self) -> Result<bool, PageSourceError> {
        Ok(self.current + 1 < self.pages.len())
    }

    async fn advance_page(&mut self) -> Result<bool, PageSourceError> {
        if self.current + 1 < self.pages.len() {
            self.current += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn rewind(&mut self) -> Result<(), PageSourceError> {
        self.current = 0;
        Ok(())
    }
}
