//! Configuration management for the enrichment pipeline.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Every component receives the section it
//! needs at construction time; nothing reads configuration from globals.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/contact-enrich/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote enrichment service settings
    pub api: ApiConfig,
    /// Bulk job submission and polling settings
    pub bulk: BulkConfig,
    /// Per-identifier request settings
    pub per_identifier: PerIdentifierConfig,
    /// Checkpoint storage settings
    pub checkpoint: CheckpointConfig,
    /// Pipeline behaviour settings
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error here.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `ENRICH_API_KEY`: API key for the enrichment service
    /// - `ENRICH_BASE_URL`: Override the service base URL
    /// - `ENRICH_MODE`: `bulk` or `per_identifier`
    /// - `ENRICH_MAX_BATCH_SIZE`: Override the bulk batch size
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to an already loaded configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("ENRICH_API_KEY") {
            if !key.trim().is_empty() {
                self.api.api_key = Some(key.trim().to_string());
                tracing::debug!("Override api.api_key from env");
            }
        }

        if let Ok(url) = std::env::var("ENRICH_BASE_URL") {
            if !url.trim().is_empty() {
                tracing::debug!("Override api.base_url from env: {}", url);
                self.api.base_url = url.trim().to_string();
            }
        }

        if let Ok(val) = std::env::var("ENRICH_MODE") {
            if let Ok(mode) = val.parse() {
                self.pipeline.mode = mode;
                tracing::debug!("Override pipeline.mode from env: {}", mode);
            }
        }

        if let Ok(val) = std::env::var("ENRICH_MAX_BATCH_SIZE") {
            if let Ok(size) = val.parse() {
                self.bulk.max_batch_size = size;
                tracing::debug!("Override bulk.max_batch_size from env: {}", size);
            }
        }
    }

    /// Check invariants that the rest of the pipeline relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        fn positive(field: &str, value: u64) -> ConfigResult<()> {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(())
        }

        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api.base_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        positive("api.timeout_secs", self.api.timeout_secs)?;
        positive("bulk.max_batch_size", self.bulk.max_batch_size as u64)?;
        positive("bulk.poll_interval_secs", self.bulk.poll_interval_secs)?;
        positive("bulk.max_poll_time_secs", self.bulk.max_poll_time_secs)?;
        positive("bulk.milestone_interval", self.bulk.milestone_interval)?;
        positive(
            "per_identifier.max_concurrent_requests",
            self.per_identifier.max_concurrent_requests as u64,
        )?;
        positive("checkpoint.keep_latest", self.checkpoint.keep_latest as u64)?;

        if self.pipeline.identifier_columns.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.identifier_columns".to_string(),
                reason: "at least one candidate column is required".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to the default location.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/contact-enrich/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "contact-enrich", "contact-enrich")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Remote enrichment service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_field_names)]
pub struct ApiConfig {
    /// Base URL of the enrichment API
    pub base_url: String,
    /// Bearer token (taken from the environment, never written to disk)
    #[serde(skip)]
    pub api_key: Option<String>,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
    /// Request email lookups
    pub email_enrichment: bool,
    /// Request phone lookups
    pub phone_enrichment: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://search.clado.ai/api/enrich".to_string(),
            api_key: None,
            timeout_secs: 60,
            email_enrichment: true,
            phone_enrichment: false,
        }
    }
}

/// Bulk job submission and polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Maximum identifiers per submitted job
    pub max_batch_size: usize,
    /// Fixed delay between status polls in seconds
    pub poll_interval_secs: u64,
    /// Wall-clock budget per job in seconds before it is abandoned
    pub max_poll_time_secs: u64,
    /// Progress is reported every time this many more items are processed
    pub milestone_interval: u64,
    /// Retries of a rate-limited or dropped submit/poll request
    pub max_retries: u32,
    /// Seed for exponential backoff between those retries, in seconds
    pub initial_backoff_secs: u64,
    /// Added on top of a server-supplied retry-after hint, in seconds
    pub retry_after_margin_secs: u64,
}

impl BulkConfig {
    /// Poll interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Maximum poll time as a `Duration`.
    #[must_use]
    pub fn max_poll_time(&self) -> Duration {
        Duration::from_secs(self.max_poll_time_secs)
    }

    /// Initial request backoff as a `Duration`.
    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    /// Retry-after safety margin as a `Duration`.
    #[must_use]
    pub fn retry_after_margin(&self) -> Duration {
        Duration::from_secs(self.retry_after_margin_secs)
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 500,
            poll_interval_secs: 5,
            max_poll_time_secs: 3600,
            milestone_interval: 50,
            max_retries: 3,
            initial_backoff_secs: 5,
            retry_after_margin_secs: 2,
        }
    }
}

/// Per-identifier request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerIdentifierConfig {
    /// Upper bound on in-flight requests
    pub max_concurrent_requests: usize,
    /// Delay after each successful response in milliseconds
    pub pacing_delay_ms: u64,
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Seed for exponential backoff in seconds
    pub initial_backoff_secs: u64,
    /// Added on top of a server-supplied retry-after hint, in seconds
    pub retry_after_margin_secs: u64,
}

impl PerIdentifierConfig {
    /// Pacing delay as a `Duration`.
    #[must_use]
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    /// Initial backoff as a `Duration`.
    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    /// Retry-after safety margin as a `Duration`.
    #[must_use]
    pub fn retry_after_margin(&self) -> Duration {
        Duration::from_secs(self.retry_after_margin_secs)
    }
}

impl Default for PerIdentifierConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            pacing_delay_ms: 1000,
            max_retries: 3,
            initial_backoff_secs: 5,
            retry_after_margin_secs: 2,
        }
    }
}

/// Checkpoint storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Directory holding checkpoint artifacts
    pub dir: PathBuf,
    /// Artifacts kept per dataset by the cleanup pass
    pub keep_latest: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("checkpoints"),
            keep_latest: 2,
        }
    }
}

/// Pipeline behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding input datasets and final outputs
    pub data_dir: PathBuf,
    /// How the enrich stage talks to the remote service
    pub mode: EnrichmentMode,
    /// Candidate identifier column names, first match wins
    pub identifier_columns: Vec<String>,
    /// Pre-existing email columns removed by the clean stage
    pub drop_columns: Vec<String>,
    /// Write an intra-stage checkpoint every this many enrichment batches (0 = never)
    pub intermediate_checkpoint_every: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            mode: EnrichmentMode::Bulk,
            identifier_columns: vec![
                "LinkedIn Profile".to_string(),
                "LinkedIn URL".to_string(),
                "linkedin_url".to_string(),
                "LinkedIn".to_string(),
            ],
            drop_columns: vec![
                "Find work email".to_string(),
                "Find Work Email".to_string(),
                "Find Work Email (2)".to_string(),
                "Find work email (2)".to_string(),
                "Find work email (3)".to_string(),
                "Find Work Email (3)".to_string(),
                "Find email".to_string(),
                "Work Email".to_string(),
            ],
            intermediate_checkpoint_every: 2,
        }
    }
}

/// Operating mode of the remote job client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMode {
    /// One server-side job per batch
    #[default]
    Bulk,
    /// Bounded-concurrency single-identifier requests
    PerIdentifier,
}

impl fmt::Display for EnrichmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bulk => write!(f, "bulk"),
            Self::PerIdentifier => write!(f, "per_identifier"),
        }
    }
}

impl FromStr for EnrichmentMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "bulk" => Ok(Self::Bulk),
            "per_identifier" | "single" => Ok(Self::PerIdentifier),
            other => Err(ConfigError::InvalidValue {
                field: "pipeline.mode".to_string(),
                reason: format!("unknown mode '{other}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bulk.max_batch_size, 500);
        assert_eq!(config.bulk.poll_interval_secs, 5);
        assert_eq!(config.bulk.max_poll_time_secs, 3600);
        assert_eq!(config.bulk.milestone_interval, 50);
        assert_eq!(config.bulk.max_retries, 3);
        assert_eq!(config.per_identifier.max_retries, 3);
        assert_eq!(config.per_identifier.initial_backoff_secs, 5);
        assert_eq!(config.checkpoint.keep_latest, 2);
        assert_eq!(config.pipeline.mode, EnrichmentMode::Bulk);
        assert!(config.api.api_key.is_none());
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_config_serialization() {
        let mut config = AppConfig::default();
        config.api.api_key = Some("secret".to_string());

        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[bulk]"));
        assert!(toml_str.contains("[per_identifier]"));
        assert!(toml_str.contains("[checkpoint]"));
        assert!(!toml_str.contains("secret"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.bulk.max_batch_size, config.bulk.max_batch_size);
        assert!(parsed.api.api_key.is_none());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.bulk.max_batch_size = 250;
        config.pipeline.mode = EnrichmentMode::PerIdentifier;
        config.save_to(&config_path).expect("save config");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.bulk.max_batch_size, 250);
        assert_eq!(loaded.pipeline.mode, EnrichmentMode::PerIdentifier);
    }

    #[test]
    fn test_load_from_missing_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let err = AppConfig::load_from(tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[bulk]
max_batch_size = 100

[pipeline]
mode = "per_identifier"
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.bulk.max_batch_size, 100);
        assert_eq!(config.pipeline.mode, EnrichmentMode::PerIdentifier);
        // These should be defaults
        assert_eq!(config.bulk.poll_interval_secs, 5);
        assert_eq!(config.per_identifier.max_concurrent_requests, 10);
    }

    #[test]
    fn test_bulk_retry_settings_are_separate() {
        let toml_str = r#"
[bulk]
max_retries = 7
initial_backoff_secs = 1

[per_identifier]
max_retries = 0
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse config");
        assert_eq!(config.bulk.max_retries, 7);
        assert_eq!(config.bulk.initial_backoff(), Duration::from_secs(1));
        assert_eq!(config.bulk.retry_after_margin(), Duration::from_secs(2));
        assert_eq!(config.per_identifier.max_retries, 0);
        assert_eq!(config.per_identifier.initial_backoff_secs, 5);
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = AppConfig::default();
        config.bulk.max_batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bulk.max_batch_size"));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("bulk".parse::<EnrichmentMode>().unwrap(), EnrichmentMode::Bulk);
        assert_eq!(
            "per-identifier".parse::<EnrichmentMode>().unwrap(),
            EnrichmentMode::PerIdentifier
        );
        assert!("fanout".parse::<EnrichmentMode>().is_err());
        assert_eq!(EnrichmentMode::PerIdentifier.to_string(), "per_identifier");
    }

    #[test]
    fn test_duration_helpers() {
        let config = AppConfig::default();
        assert_eq!(config.bulk.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.bulk.max_poll_time(), Duration::from_secs(3600));
        assert_eq!(config.per_identifier.pacing_delay(), Duration::from_secs(1));
        assert_eq!(config.per_identifier.retry_after_margin(), Duration::from_secs(2));
    }
}
