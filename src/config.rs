//! Configuration parsing
//!
//! Everything has a default, so an empty file (or no file at all) gives
//! a working setup rooted in the current directory:
//!
//! ```toml
//! [storage]
//! registry_path = "whitelist.txt"
//! attendance_log_path = "log.txt"
//! audit_path = "records.csv"
//! artifact_dir = "qr_codes"
//!
//! [scanner]
//! suppression_interval_secs = 5
//! frame_retry_limit = 1
//!
//! [issuance]
//! payload_format = "canonical"
//! max_id_attempts = 8
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cooldown::{Cooldown, DEFAULT_INTERVAL_SECS};
use crate::issuance::DEFAULT_MAX_ID_ATTEMPTS;
use crate::session::DEFAULT_FRAME_RETRY_LIMIT;
use crate::token::PayloadFormat;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub issuance: IssuanceConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Like [`from_file`](Self::from_file), but a missing file yields defaults.
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a value is out of range.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.issuance.max_id_attempts == 0 {
            return Err(ConfigError::Validation(
                "issuance.max_id_attempts must be at least 1".to_string(),
            ));
        }
        for (key, path) in [
            ("storage.registry_path", &self.storage.registry_path),
            ("storage.attendance_log_path", &self.storage.attendance_log_path),
            ("storage.audit_path", &self.storage.audit_path),
            ("storage.artifact_dir", &self.storage.artifact_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Where each store lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Authorized payloads, one per line.
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,

    /// Attendance events, one per line.
    #[serde(default = "default_attendance_log_path")]
    pub attendance_log_path: PathBuf,

    /// Issuance audit CSV.
    #[serde(default = "default_audit_path")]
    pub audit_path: PathBuf,

    /// Root of the per-day artifact directories.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            attendance_log_path: default_attendance_log_path(),
            audit_path: default_audit_path(),
            artifact_dir: default_artifact_dir(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("whitelist.txt")
}

fn default_attendance_log_path() -> PathBuf {
    PathBuf::from("log.txt")
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("records.csv")
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("qr_codes")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    /// Minimum seconds between two logged events for the same payload.
    #[serde(default = "default_suppression_interval_secs")]
    pub suppression_interval_secs: u64,

    /// Consecutive frame failures to retry before ending the session.
    #[serde(default = "default_frame_retry_limit")]
    pub frame_retry_limit: u32,
}

impl ScannerConfig {
    pub fn cooldown(&self) -> Cooldown {
        Cooldown::from_secs(self.suppression_interval_secs)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            suppression_interval_secs: default_suppression_interval_secs(),
            frame_retry_limit: default_frame_retry_limit(),
        }
    }
}

const fn default_suppression_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

const fn default_frame_retry_limit() -> u32 {
    DEFAULT_FRAME_RETRY_LIMIT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuanceConfig {
    #[serde(default)]
    pub payload_format: PayloadFormat,

    /// Ids to draw before giving up on one not already registered.
    #[serde(default = "default_max_id_attempts")]
    pub max_id_attempts: u32,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            payload_format: PayloadFormat::default(),
            max_id_attempts: default_max_id_attempts(),
        }
    }
}

const fn default_max_id_attempts() -> u32 {
    DEFAULT_MAX_ID_ATTEMPTS
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
