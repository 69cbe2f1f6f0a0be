//! Persisted run settings.
//!
//! Settings live in a JSON file with camelCase keys. Missing keys take their
//! defaults and unknown keys are ignored, so older and newer files both load.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::normalize::DEFAULT_MIRROR_HOSTS;

const MAX_DELAY_MS: u64 = 60_000;

/// Errors from loading, validating or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A setting is outside its accepted range.
    #[error("invalid setting `{field}`: {value}. Expected {expected}")]
    Invalid {
        /// camelCase key of the setting.
        field: &'static str,
        /// Offending value.
        value: String,
        /// Accepted range or shape.
        expected: &'static str,
    },

    /// The settings file could not be read or written.
    #[error("settings file {path}: {source}")]
    Io {
        /// Settings file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Settings could not be encoded.
    #[error("cannot encode settings: {0}")]
    Encode(#[from] serde_json::Error),

    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    #[error("no configuration directory: set XDG_CONFIG_HOME or HOME")]
    NoConfigDir,
}

/// Operator-tunable settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Wait between descriptors on a page, in milliseconds.
    pub inter_download_delay: u64,
    /// Wait between pages, in milliseconds.
    pub inter_page_delay: u64,
    /// Network attempts per descriptor, including the first.
    pub max_retries: u32,
    /// Prefix of every saved file name.
    pub target_name_prefix: String,
    /// Host downloads are normalized to. Absent means the listing's own host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_host: Option<String>,
    /// Whether run milestones are announced through the notifier.
    pub notifications_enabled: bool,
    /// Wait between attempts of one descriptor, in milliseconds.
    pub retry_delay: u64,
    /// Per-attempt timeout, in seconds.
    pub request_timeout: u64,
    /// Interchangeable mirror hosts.
    pub mirror_hosts: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inter_download_delay: 1000,
            inter_page_delay: 2000,
            max_retries: 3,
            target_name_prefix: "archive".to_string(),
            canonical_host: None,
            notifications_enabled: true,
            retry_delay: 1000,
            request_timeout: 30,
            mirror_hosts: DEFAULT_MIRROR_HOSTS.iter().map(|h| (*h).to_string()).collect(),
        }
    }
}

impl Settings {
    /// Checks every value against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_delay("interDownloadDelay", self.inter_download_delay)?;
        validate_delay("interPageDelay", self.inter_page_delay)?;
        validate_delay("retryDelay", self.retry_delay)?;
        if !(1..=10).contains(&self.max_retries) {
            return Err(SettingsError::Invalid {
                field: "maxRetries",
                value: self.max_retries.to_string(),
                expected: "1..=10",
            });
        }
        if !(1..=3600).contains(&self.request_timeout) {
            return Err(SettingsError::Invalid {
                field: "requestTimeout",
                value: self.request_timeout.to_string(),
                expected: "1..=3600 seconds",
            });
        }
        if self.target_name_prefix.trim().is_empty() || self.target_name_prefix.contains(['/', '\\'])
        {
            return Err(SettingsError::Invalid {
                field: "targetNamePrefix",
                value: format!("{:?}", self.target_name_prefix),
                expected: "a non-empty name without path separators",
            });
        }
        if self.mirror_hosts.iter().all(|h| h.trim().is_empty()) {
            return Err(SettingsError::Invalid {
                field: "mirrorHosts",
                value: "[]".to_string(),
                expected: "at least one host",
            });
        }
        Ok(())
    }

    /// Wait between descriptors.
    #[must_use]
    pub fn inter_download_delay(&self) -> Duration {
        Duration::from_millis(self.inter_download_delay)
    }

    /// Wait between pages.
    #[must_use]
    pub fn inter_page_delay(&self) -> Duration {
        Duration::from_millis(self.inter_page_delay)
    }

    /// Wait between attempts.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay)
    }

    /// Per-attempt timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

fn validate_delay(field: &'static str, value: u64) -> Result<(), SettingsError> {
    if value > MAX_DELAY_MS {
        return Err(SettingsError::Invalid {
            field,
            value: value.to_string(),
            expected: "0..=60000 milliseconds",
        });
    }
    Ok(())
}

/// Loads and saves [`Settings`].
pub trait SettingsStore {
    /// Returns the stored settings, or defaults when nothing usable is stored.
    fn load(&self) -> Settings;

    /// Persists `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the settings are invalid or cannot be written.
    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;
}

/// Resolves the default settings path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/archive-fetch/settings.json`
/// 2. `$HOME/.config/archive-fetch/settings.json`
#[must_use]
pub fn resolve_default_settings_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("archive-fetch")
                .join("settings.json"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("archive-fetch")
            .join("settings.json"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// JSON file backed [`SettingsStore`].
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    /// Store at an explicit path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at [`resolve_default_settings_path`].
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::NoConfigDir`] when no base directory is known.
    pub fn default_location() -> Result<Self, SettingsError> {
        resolve_default_settings_path()
            .map(Self::at)
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Path of the settings file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the settings file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Removes the settings file; a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Io`] when the file exists but cannot be removed.
    pub fn reset(&self) -> Result<(), SettingsError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SettingsError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Settings {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file, using defaults");
                return Settings::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read settings, using defaults");
                return Settings::default();
            }
        };

        let settings: Settings = match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "malformed settings, using defaults");
                return Settings::default();
            }
        };
        if let Err(e) = settings.validate() {
            warn!(path = %self.path.display(), error = %e, "invalid settings, using defaults");
            return Settings::default();
        }
        settings
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        settings.validate()?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.inter_download_delay, 1000);
        assert_eq!(settings.inter_page_delay, 2000);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.target_name_prefix, "archive");
        assert!(settings.canonical_host.is_none());
        assert!(settings.notifications_enabled);
        assert_eq!(settings.mirror_hosts.len(), DEFAULT_MIRROR_HOSTS.len());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"maxRetries": 5, "targetNamePrefix": "bets", "extra": 1}"#)
                .unwrap();
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.target_name_prefix, "bets");
        assert_eq!(settings.inter_page_delay, 2000);
    }

    #[test]
    fn test_settings_validate_rejects_out_of_range() {
        let mut settings = Settings::default();
        settings.max_retries = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid {
                field: "maxRetries",
                ..
            })
        ));

        let mut settings = Settings::default();
        settings.inter_download_delay = 60_001;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.target_name_prefix = "a/b".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.mirror_hosts.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_json_store_missing_file_loads_defaults() {
        let temp = TempDir::new().unwrap();
        let store = JsonSettingsStore::at(temp.path().join("settings.json"));
        assert!(!store.exists());
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_json_store_malformed_file_loads_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(JsonSettingsStore::at(&path).load(), Settings::default());
    }

    #[test]
    fn test_json_store_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = JsonSettingsStore::at(temp.path().join("nested").join("settings.json"));
        let settings = Settings {
            inter_download_delay: 250,
            canonical_host: Some("stake.com".to_string()),
            ..Settings::default()
        };

        store.save(&settings).unwrap();

        assert_eq!(store.load(), settings);
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"interDownloadDelay\": 250"), "got {raw}");
    }

    #[test]
    fn test_json_store_save_rejects_invalid() {
        let temp = TempDir::new().unwrap();
        let store = JsonSettingsStore::at(temp.path().join("settings.json"));
        let settings = Settings {
            max_retries: 99,
            ..Settings::default()
        };
        assert!(store.save(&settings).is_err());
        assert!(!store.exists());
    }

    #[test]
    fn test_json_store_reset_removes_file() {
        let temp = TempDir::new().unwrap();
        let store = JsonSettingsStore::at(temp.path().join("settings.json"));
        store.save(&Settings::default()).unwrap();
        store.reset().unwrap();
        assert!(!store.exists());
        store.reset().unwrap();
    }
}
