//! Configuration loading and validation.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Time windows and limits enforced by the match lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// How long after the start players may still join
    #[serde(default = "default_join_grace_hours")]
    pub join_grace_hours: u32,

    /// How long after the start a result may be created, edited or confirmed
    #[serde(default = "default_result_window_hours")]
    pub result_window_hours: u32,

    /// How long after the end an unresulted match may still be cancelled
    #[serde(default = "default_cancel_after_end_hours")]
    pub cancel_after_end_hours: u32,

    #[serde(default = "default_capacity")]
    pub default_capacity: usize,

    #[serde(default = "default_max_capacity")]
    pub max_capacity: usize,

    /// Allowed gap between stored and ledger ratings before audit flags it
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance: f64,
}

fn default_join_grace_hours() -> u32 {
    12
}

fn default_result_window_hours() -> u32 {
    24
}

fn default_cancel_after_end_hours() -> u32 {
    48
}

fn default_capacity() -> usize {
    4
}

fn default_max_capacity() -> usize {
    16
}

fn default_drift_tolerance() -> f64 {
    0.01
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            join_grace_hours: default_join_grace_hours(),
            result_window_hours: default_result_window_hours(),
            cancel_after_end_hours: default_cancel_after_end_hours(),
            default_capacity: default_capacity(),
            max_capacity: default_max_capacity(),
            drift_tolerance: default_drift_tolerance(),
        }
    }
}

impl RulesConfig {
    pub fn join_grace(&self) -> Duration {
        Duration::hours(i64::from(self.join_grace_hours))
    }

    pub fn result_window(&self) -> Duration {
        Duration::hours(i64::from(self.result_window_hours))
    }

    pub fn cancel_after_end(&self) -> Duration {
        Duration::hours(i64::from(self.cancel_after_end_hours))
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub rules: RulesConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            server: ServerConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rules = &self.rules;

        if rules.join_grace_hours == 0
            || rules.result_window_hours == 0
            || rules.cancel_after_end_hours == 0
        {
            return Err(ConfigError::ValidationError(
                "Time windows must be greater than 0".to_string(),
            ));
        }

        if rules.default_capacity < 4 {
            return Err(ConfigError::ValidationError(
                "Default capacity must fit one doubles game (4 players)".to_string(),
            ));
        }

        if rules.default_capacity > rules.max_capacity {
            return Err(ConfigError::ValidationError(
                "Default capacity exceeds max capacity".to_string(),
            ));
        }

        if rules.drift_tolerance <= 0.0 || !rules.drift_tolerance.is_finite() {
            return Err(ConfigError::ValidationError(
                "Drift tolerance must be a positive number".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
