//! Configuration management
//!
//! TOML configuration with environment variable overrides and sensible
//! defaults for the query engine: which index to query, the default and
//! maximum pagination window, and logging.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{DEFAULT_LIMIT, DEFAULT_START};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Search backend configuration
    pub backend: BackendConfig,

    /// Query parameter defaults and limits
    pub query: QueryConfig,

    /// Monitoring and observability
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Search backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend base URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Index holding the indicator documents
    #[serde(default = "default_index")]
    pub index: String,

    /// Request timeout in seconds (enforced by the transport)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Query parameter defaults and limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Default pagination offset
    #[serde(default = "default_start")]
    pub default_start: usize,

    /// Default pagination limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Maximum allowed pagination limit
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_url() -> String { "http://localhost:9200".to_string() }
fn default_index() -> String { "indicators".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_start() -> usize { DEFAULT_START }
fn default_limit() -> usize { DEFAULT_LIMIT }
fn default_max_limit() -> usize { 1000 }
fn default_log_level() -> String { "info".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            query: QueryConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            index: default_index(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_start: default_start(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Load configuration from a file with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TEMPORA_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Ok(index) = std::env::var("TEMPORA_INDEX") {
            self.backend.index = index;
        }
        if let Ok(limit) = std::env::var("TEMPORA_MAX_LIMIT") {
            if let Ok(l) = limit.parse() {
                self.query.max_limit = l;
            }
        }
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.url.is_empty() {
            return Err(ConfigError::Validation(
                "backend url cannot be empty".to_string(),
            ));
        }
        if self.backend.index.is_empty() {
            return Err(ConfigError::Validation(
                "backend index cannot be empty".to_string(),
            ));
        }
        if self.query.default_limit == 0 {
            return Err(ConfigError::Validation(
                "default limit must be > 0".to_string(),
            ));
        }
        if self.query.default_limit > self.query.max_limit {
            return Err(ConfigError::Validation(format!(
                "default limit {} exceeds max limit {}",
                self.query.default_limit, self.query.max_limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.index, "indicators");
        assert_eq!(config.query.default_limit, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_limit_validation() {
        let mut config = Config::default();
        config.query.default_limit = 5000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_index_rejected() {
        let mut config = Config::default();
        config.backend.index.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [backend]
            index = "series"

            [query]
            max_limit = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.index, "series");
        assert_eq!(config.backend.url, "http://localhost:9200");
        assert_eq!(config.query.max_limit, 500);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("TEMPORA_INDEX", "other");
        let config = Config::from_env();
        assert_eq!(config.backend.index, "other");
        std::env::remove_var("TEMPORA_INDEX");
    }
}
