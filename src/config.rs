//! Orchestrator settings and the JSON file configuration.
//!
//! [`OrchestratorConfig`] is what the library consumes. [`FileConfig`] is the
//! optional on-disk layer the binary merges under its command-line flags.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::progress::DEFAULT_CHANNEL_CAPACITY;
use crate::retry::DEFAULT_RETRY_BACKOFF;

/// Default target audio quality.
pub const DEFAULT_QUALITY: &str = "320k";

/// Largest accepted `max_retries` in the file config.
pub const MAX_RETRIES_LIMIT: u32 = 100;

/// Largest accepted `retry_backoff_ms` in the file config (10 minutes).
pub const MAX_RETRY_BACKOFF_MS: u64 = 600_000;

/// Errors raised while loading or validating the file config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("failed to access config file {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for [`FileConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// Field name as written in the file.
        field: &'static str,
        /// Offending value.
        value: String,
        /// Accepted range.
        expected: &'static str,
    },
}

/// Settings consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Root directory for processor output.
    pub output_root: PathBuf,
    /// Target audio quality passed to the processor.
    pub quality_hint: String,
    /// Whether retryable failures are deferred and retried.
    pub auto_retry_enabled: bool,
    /// Retry cap per item; 0 means unlimited.
    pub max_retries: u32,
    /// Pause between retry waves.
    pub retry_backoff: Duration,
    /// Buffer size of the snapshot and log broadcast streams.
    pub channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            quality_hint: DEFAULT_QUALITY.to_string(),
            auto_retry_enabled: true,
            max_retries: 0,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    /// Sets the output root.
    #[must_use]
    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }

    /// Sets the quality hint.
    #[must_use]
    pub fn with_quality_hint(mut self, quality: impl Into<String>) -> Self {
        self.quality_hint = quality.into();
        self
    }

    /// Enables or disables automatic retries.
    #[must_use]
    pub fn with_auto_retry(mut self, enabled: bool) -> Self {
        self.auto_retry_enabled = enabled;
        self
    }

    /// Sets the retry cap (0 = unlimited).
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the pause between retry waves.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets the broadcast buffer size.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Applies every value set in `file` on top of `self`.
    #[must_use]
    pub fn merged_with(mut self, file: &FileConfig) -> Self {
        if let Some(dir) = &file.output_dir {
            self.output_root.clone_from(dir);
        }
        if let Some(quality) = &file.quality {
            self.quality_hint.clone_from(quality);
        }
        if let Some(enabled) = file.auto_retry {
            self.auto_retry_enabled = enabled;
        }
        if let Some(max_retries) = file.max_retries {
            self.max_retries = max_retries;
        }
        if let Some(ms) = file.retry_backoff_ms {
            self.retry_backoff = Duration::from_millis(ms);
        }
        self
    }
}

/// JSON-backed defaults, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Default output directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Default audio quality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    /// Retry access-denied items automatically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_retry: Option<bool>,
    /// Retry cap per item (0 = unlimited).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Pause between retry waves in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,
}

impl FileConfig {
    /// Validates values against the accepted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max_retries) = self.max_retries
            && max_retries > MAX_RETRIES_LIMIT
        {
            return Err(ConfigError::OutOfRange {
                field: "max_retries",
                value: max_retries.to_string(),
                expected: "0..=100",
            });
        }
        if let Some(backoff) = self.retry_backoff_ms
            && backoff > MAX_RETRY_BACKOFF_MS
        {
            return Err(ConfigError::OutOfRange {
                field: "retry_backoff_ms",
                value: backoff.to_string(),
                expected: "0..=600000",
            });
        }
        Ok(())
    }

    /// Loads and validates the config at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded file config");
        Ok(config)
    }

    /// Loads the config at `path`, treating a missing file as empty.
    ///
    /// # Errors
    ///
    /// Same as [`FileConfig::load`] for files that exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Writes the config as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_error)
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mixtape/config.json`
/// 2. `$HOME/.config/mixtape/config.json`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("mixtape")
                .join("config.json"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("mixtape")
            .join("config.json"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.quality_hint, "320k");
        assert!(config.auto_retry_enabled);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_backoff, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = OrchestratorConfig::default()
            .with_output_root("/tmp/music")
            .with_quality_hint("192k")
            .with_auto_retry(false)
            .with_max_retries(3)
            .with_retry_backoff(Duration::from_millis(10))
            .with_channel_capacity(8);
        assert_eq!(config.output_root, PathBuf::from("/tmp/music"));
        assert_eq!(config.quality_hint, "192k");
        assert!(!config.auto_retry_enabled);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_backoff, Duration::from_millis(10));
        assert_eq!(config.channel_capacity, 8);
    }

    #[test]
    fn test_merge_only_overrides_set_fields() {
        let file = FileConfig {
            max_retries: Some(4),
            ..FileConfig::default()
        };
        let merged = OrchestratorConfig::default().merged_with(&file);
        assert_eq!(merged.max_retries, 4);
        assert_eq!(merged.quality_hint, "320k");
        assert!(merged.auto_retry_enabled);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = FileConfig {
            max_retries: Some(101),
            ..FileConfig::default()
        };
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("max_retries"));

        let config = FileConfig {
            retry_backoff_ms: Some(600_001),
            ..FileConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_parses_json_and_ignores_unknown_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"quality":"256k","auto_retry":false,"max_retries":2,"theme":"dark"}"#,
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.quality.as_deref(), Some("256k"));
        assert_eq!(config.auto_retry, Some(false));
        assert_eq!(config.max_retries, Some(2));
        assert_eq!(config.output_dir, None);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_or_default_with_missing_file() {
        let temp = TempDir::new().unwrap();
        let config = FileConfig::load_or_default(&temp.path().join("missing.json")).unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.json");
        let config = FileConfig {
            output_dir: Some(PathBuf::from("/music")),
            retry_backoff_ms: Some(250),
            ..FileConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(FileConfig::load(&path).unwrap(), config);
    }
}
