//! Configuration management.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. `config.toml` (explicit path, or `<config_dir>/notiledger/config.toml`)
//! 3. `NOTILEDGER_*` environment variables
//!
//! ```toml
//! data_dir = "/var/lib/notiledger"
//!
//! [dedup]
//! enabled = true
//! window_secs = 20
//! burst_ceiling = 10
//!
//! [pipeline]
//! acceptance_threshold = 0.6
//!
//! [sources."com.tencent.mm"]
//! mode = "enabled"
//! blacklist = ["群收款"]
//! ```

mod runtime;
mod source;

pub use runtime::{
    DEFAULT_ACCEPTANCE_THRESHOLD, DEFAULT_MIN_AUTO_AMOUNT_CENTS, PipelineSettings,
    RuntimeSettings, SharedSettings,
};
pub use source::{SourceMode, SourceRule};

use crate::gc::RetentionConfig;
use crate::observability::{LogFormat, LoggingConfig};
use crate::parsers::ConfidenceWeights;
use crate::services::DedupConfig;
use crate::storage::{DB_FILE_NAME, get_user_data_dir};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "NOTILEDGER_CONFIG_PATH";

/// Main configuration for notiledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NotiledgerConfig {
    /// Directory holding the dedup database.
    pub data_dir: PathBuf,
    /// Dedup stage settings.
    pub dedup: DedupConfig,
    /// Confidence weights.
    pub confidence: ConfidenceWeights,
    /// Commit-stage settings.
    pub pipeline: PipelineSettings,
    /// Retention policy.
    pub retention: RetentionConfig,
    /// Log output.
    pub logging: LoggingConfig,
    /// Per-source rules.
    pub sources: BTreeMap<String, SourceRule>,
}

impl Default for NotiledgerConfig {
    fn default() -> Self {
        Self {
            data_dir: get_user_data_dir(),
            dedup: DedupConfig::default(),
            confidence: ConfidenceWeights::default(),
            pipeline: PipelineSettings::default(),
            retention: RetentionConfig::default(),
            logging: LoggingConfig::default(),
            sources: BTreeMap::new(),
        }
    }
}

/// Configuration file structure (for TOML parsing and display).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Dedup section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup: Option<ConfigFileDedup>,
    /// Confidence section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceWeights>,
    /// Pipeline section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineSettings>,
    /// Retention section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<RetentionConfig>,
    /// Logging section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
    /// Per-source rules.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, SourceRule>,
}

/// Dedup section in config file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFileDedup {
    /// Enable dedup and burst checks.
    pub enabled: Option<bool>,
    /// Window in seconds; clamped into range.
    pub window_secs: Option<i64>,
    /// Burst ceiling; must be at least 1.
    pub burst_ceiling: Option<u64>,
}

impl NotiledgerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be read and
    /// [`Error::InvalidConfig`] if it does not parse or fails validation.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses and validates TOML configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] on syntax or validation errors.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Self::from_config_file(file)
    }

    /// Path of the default config file, if a config directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("notiledger").join("config.toml"))
    }

    /// Loads the default config file, falling back to defaults when it does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is invalid.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Resolves the effective configuration: the explicit file (or the
    /// default one), then environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is present but invalid, or if an
    /// explicit path cannot be read.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default()?,
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Applies `NOTILEDGER_*` overrides from `lookup`.
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup("NOTILEDGER_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir.trim());
            }
        }

        self.dedup = self.dedup.with_overrides(&lookup);
        self.retention = self.retention.with_overrides(&lookup);

        if let Some(value) = lookup("NOTILEDGER_ACCEPTANCE_THRESHOLD") {
            match value.trim().parse::<f64>() {
                Ok(threshold) if (0.0..=1.0).contains(&threshold) => {
                    self.pipeline.acceptance_threshold = threshold;
                },
                _ => tracing::warn!(value = %value, "Ignoring invalid NOTILEDGER_ACCEPTANCE_THRESHOLD"),
            }
        }

        if let Some(value) = lookup("NOTILEDGER_LOG_FORMAT") {
            match LogFormat::parse(&value) {
                Some(format) => self.logging.format = format,
                None => tracing::warn!(value = %value, "Ignoring invalid NOTILEDGER_LOG_FORMAT"),
            }
        }

        self
    }

    /// Builder method to set the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Path of the dedup database.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    /// The per-decision view of this configuration.
    #[must_use]
    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            dedup: self.dedup,
            confidence: self.confidence,
            pipeline: self.pipeline.clone(),
            sources: self
                .sources
                .iter()
                .map(|(source, rule)| (source.clone(), rule.clone()))
                .collect(),
        }
    }

    /// Renders the effective configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        let file = ConfigFile {
            data_dir: Some(self.data_dir.display().to_string()),
            dedup: Some(ConfigFileDedup {
                enabled: Some(self.dedup.enabled),
                window_secs: Some(i64::from(self.dedup.window_secs())),
                burst_ceiling: Some(self.dedup.burst_ceiling()),
            }),
            confidence: Some(self.confidence),
            pipeline: Some(self.pipeline.clone()),
            retention: Some(self.retention),
            logging: Some(self.logging.clone()),
            sources: self.sources.clone(),
        };
        toml::to_string_pretty(&file).map_err(|e| Error::OperationFailed {
            operation: "serialize_config".to_string(),
            cause: e.to_string(),
        })
    }

    /// Converts a `ConfigFile` to `NotiledgerConfig`, validating ranges.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Some(dedup) = file.dedup {
            if let Some(enabled) = dedup.enabled {
                config.dedup = config.dedup.with_enabled(enabled);
            }
            if let Some(window_secs) = dedup.window_secs {
                config.dedup = config.dedup.with_window_secs(window_secs);
            }
            if let Some(ceiling) = dedup.burst_ceiling {
                if ceiling == 0 {
                    return Err(Error::InvalidConfig(
                        "dedup.burst_ceiling must be at least 1".to_string(),
                    ));
                }
                config.dedup = config.dedup.with_burst_ceiling(ceiling);
            }
        }

        if let Some(confidence) = file.confidence {
            confidence.validate()?;
            config.confidence = confidence;
        }

        if let Some(pipeline) = file.pipeline {
            if !(0.0..=1.0).contains(&pipeline.acceptance_threshold) {
                return Err(Error::InvalidConfig(format!(
                    "pipeline.acceptance_threshold must be in [0, 1], got {}",
                    pipeline.acceptance_threshold
                )));
            }
            if pipeline.min_auto_amount_cents < 0 {
                return Err(Error::InvalidConfig(
                    "pipeline.min_auto_amount_cents must not be negative".to_string(),
                ));
            }
            config.pipeline = pipeline;
        }

        if let Some(retention) = file.retention {
            retention.validate()?;
            config.retention = retention;
        }

        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        for source in file.sources.keys() {
            if source.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "sources: app id must not be empty".to_string(),
                ));
            }
        }
        config.sources = file.sources;

        Ok(config)
    }
}
