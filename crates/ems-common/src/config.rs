//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the intake client."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_base_url() -> String {
    "http://127.0.0.1:5000/".to_owned()
}

fn default_user_agent() -> String {
    concat!("ems-intake/", env!("CARGO_PKG_VERSION")).to_owned()
}

fn default_high_accuracy() -> bool {
    true
}

fn default_one_shot_timeout() -> Duration {
    Duration::from_millis(10_000)
}

fn default_watch_timeout() -> Duration {
    Duration::from_millis(15_000)
}

fn default_watch_max_age() -> Duration {
    Duration::from_millis(5_000)
}

fn default_fallback_timeout() -> Duration {
    Duration::from_millis(8_000)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_step() -> Duration {
    Duration::from_millis(2_000)
}

fn default_min_message_chars() -> usize {
    5
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_directory() -> PathBuf {
    PathBuf::from("target/intake-cache")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for the intake client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "EMS_INTAKE_CONFIG";

    /// Load configuration from disk, respecting the `EMS_INTAKE_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.backend.validate()?;
        self.location.validate()?;
        if self.intake.min_message_chars == 0 {
            return Err(anyhow!("intake.min_message_chars must be at least 1"));
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Where the triage/booking backend lives and how to talk to it.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Transport-level timeout. Absent by default: requests rely on the
    /// transport's own behaviour.
    #[serde(default)]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub request_timeout: Option<Duration>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: None,
            user_agent: default_user_agent(),
        }
    }
}

impl BackendConfig {
    /// Parse the base URL, normalising it to end with `/` so relative joins
    /// keep any path prefix.
    pub fn base_url(&self) -> Result<Url> {
        let mut raw = self.base_url.trim().to_owned();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw)
            .with_context(|| format!("invalid backend.base_url '{}'", self.base_url))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(anyhow!(
                "backend.base_url must use http or https, got '{}'",
                other
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.base_url().map(|_| ())
    }
}

/// Coordinates reported by the fixed device on hosts without positioning hardware.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedPositionConfig {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy_meters: Option<f64>,
}

/// Timeouts and retry bounds for location acquisition.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_high_accuracy")]
    pub high_accuracy: bool,
    #[serde(default = "default_one_shot_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub one_shot_timeout: Duration,
    #[serde(default = "default_watch_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub watch_timeout: Duration,
    #[serde(default = "default_watch_max_age")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub watch_max_age: Duration,
    #[serde(default = "default_fallback_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub fallback_timeout: Duration,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_step")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub backoff_step: Duration,
    #[serde(default)]
    pub fixed: Option<FixedPositionConfig>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            high_accuracy: default_high_accuracy(),
            one_shot_timeout: default_one_shot_timeout(),
            watch_timeout: default_watch_timeout(),
            watch_max_age: default_watch_max_age(),
            fallback_timeout: default_fallback_timeout(),
            max_attempts: default_max_attempts(),
            backoff_step: default_backoff_step(),
            fixed: None,
        }
    }
}

impl LocationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("location.max_attempts must be at least 1"));
        }
        if let Some(fixed) = &self.fixed {
            if !(-90.0..=90.0).contains(&fixed.latitude)
                || !(-180.0..=180.0).contains(&fixed.longitude)
            {
                return Err(anyhow!(
                    "location.fixed ({}, {}) is outside the valid coordinate range",
                    fixed.latitude,
                    fixed.longitude
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default = "default_min_message_chars")]
    pub min_message_chars: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            min_message_chars: default_min_message_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            directory: default_cache_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
