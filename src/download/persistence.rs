//! Local persistence of retrieved resources.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, instrument};

use super::error::DownloadError;
use super::filename::validate_target_name;

/// Saves retrieved bytes under a target name.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Persists `bytes` as `target_name` and returns where they were written.
    async fn save(&self, bytes: &[u8], target_name: &str) -> Result<PathBuf, DownloadError>;
}

/// Writes resources as files inside one output directory.
///
/// Each file is first written to a hidden `.{name}.part` sibling and then
/// renamed, so a partially written file never shows up under its final name.
/// Saving the same name twice replaces the earlier file.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Creates a store rooted at `root`. The directory is created on first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Persistence for DirectoryStore {
    #[instrument(skip(self, bytes), fields(root = %self.root.display(), bytes = bytes.len()))]
    async fn save(&self, bytes: &[u8], target_name: &str) -> Result<PathBuf, DownloadError> {
        validate_target_name(target_name)?;

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DownloadError::io(&self.root, e))?;

        let final_path = self.root.join(target_name);
        let part_path = self.root.join(format!(".{target_name}.part"));

        if let Err(e) = fs::write(&part_path, bytes).await {
            let _ = fs::remove_file(&part_path).await;
            return Err(DownloadError::io(&part_path, e));
        }
        if let Err(e) = fs::rename(&part_path, &final_path).await {
            let _ = fs::remove_file(&part_path).await;
            return Err(DownloadError::io(&final_path, e));
        }

        debug!(path = %final_path.display(), "resource saved");
        Ok(final_path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::FailureKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_directory_store_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(temp_dir.path());

        let path = store
            .save(b"{\"ok\":true}", "archive_2024-01-01.json")
            .await
            .unwrap();

        assert_eq!(path, temp_dir.path().join("archive_2024-01-01.json"));
        assert_eq!(std::fs::read(&path).unwrap(), b"{\"ok\":true}");
        assert!(!temp_dir.path().join(".archive_2024-01-01.json.part").exists());
    }

    #[tokio::test]
    async fn test_directory_store_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let store = DirectoryStore::new(&nested);

        store.save(b"x", "archive_invalid-date.json").await.unwrap();

        assert!(nested.join("archive_invalid-date.json").exists());
    }

    #[tokio::test]
    async fn test_directory_store_overwrites_existing_name() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(temp_dir.path());

        store.save(b"first", "a.json").await.unwrap();
        let path = store.save(b"second", "a.json").await.unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_directory_store_rejects_traversal_name() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(temp_dir.path().join("out"));

        let err = store.save(b"x", "../escape.json").await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::InvalidInput);
        assert!(!temp_dir.path().join("escape.json").exists());
    }

    #[tokio::test]
    async fn test_directory_store_reports_io_failure() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let store = DirectoryStore::new(&blocker);

        let err = store.save(b"x", "a.json").await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::PersistenceFailure);
    }
}
