//! Dashboard settings
//!
//! Layered from an optional `dashboard.toml` and `DASHBOARD__*` environment
//! variables (e.g. `DASHBOARD__BACKEND__API_KEY`) over the defaults below.

use config::{Config, ConfigBuilder, Environment, File};
use occupancy_fetcher::{BackendConfig, DEFAULT_FETCH_LIMIT};
use refresh_scheduler::{DriverConfig, RefreshInterval};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file looked up when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "dashboard";

const ENV_PREFIX: &str = "DASHBOARD";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Interval selected at startup (5s, 10s, 30s or manual)
    pub initial_interval: RefreshInterval,
    /// Measurements requested per fetch
    pub fetch_limit: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            initial_interval: RefreshInterval::ThirtySeconds,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete dashboard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub backend: BackendConfig,
    pub scheduler: SchedulerSettings,
    pub logging: LoggingConfig,
}

impl DashboardConfig {
    /// Load from the config file and the process environment
    ///
    /// The file is optional unless a path is given explicitly.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE)).required(path.is_some()))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config: DashboardConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the dashboard cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.api_key must be set".to_string()));
        }
        if !(self.backend.base_url.starts_with("http://") || self.backend.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "backend.base_url must be an http(s) URL, got '{}'",
                self.backend.base_url
            )));
        }
        if self.backend.table.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.table must be set".to_string()));
        }
        if self.scheduler.fetch_limit == 0 {
            return Err(ConfigError::Invalid("scheduler.fetch_limit must be positive".to_string()));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "logging.level '{}' is not a valid level",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Settings for the refresh driver
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            fetch_limit: self.scheduler.fetch_limit,
            initial_interval: self.scheduler.initial_interval,
        }
    }
}
