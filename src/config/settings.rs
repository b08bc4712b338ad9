//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use serde::Deserialize;

use crate::error::ConfigError;
use crate::upstream::DEFAULT_THERMO_TYPE;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Upstream API settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Result shaping settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.upstream.base_url;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::ValidationError {
                message: format!("Invalid upstream base_url '{url}'. Must start with http:// or https://"),
            });
        }
        if self.upstream.api_key_env.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "upstream.api_key_env cannot be empty".to_string(),
            });
        }
        if self.upstream.thermo_type.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "upstream.thermo_type cannot be empty".to_string(),
            });
        }
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "upstream.timeout_secs must be at least 1".to_string(),
            });
        }
        if self.output.max_results == 0 || self.output.max_sites == 0 {
            return Err(ConfigError::ValidationError {
                message: "output.max_results and output.max_sites must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Materials Project API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL of the REST API.
    /// Default: `https://api.materialsproject.org`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay before the single retry of a transient failure, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Thermodynamic calculation scheme used for phase diagrams.
    /// Default: `GGA_GGA+U_R2SCAN`
    #[serde(default = "default_thermo_type")]
    pub thermo_type: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            retry_delay_ms: default_retry_delay_ms(),
            thermo_type: default_thermo_type(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.materialsproject.org".to_string()
}

fn default_api_key_env() -> String {
    "MP_API_KEY".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_retry_delay_ms() -> u64 {
    500
}

fn default_thermo_type() -> String {
    DEFAULT_THERMO_TYPE.to_string()
}

/// Result shaping configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Maximum number of records returned by any tool.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Maximum number of sites listed for a single structure.
    #[serde(default = "default_max_sites")]
    pub max_sites: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            max_sites: default_max_sites(),
        }
    }
}

const fn default_max_results() -> usize {
    50
}

const fn default_max_sites() -> usize {
    500
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.upstream.api_key_env, "MP_API_KEY");
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "upstream": {
                "base_url": "http://localhost:8080",
                "api_key_env": "MY_MP_KEY",
                "timeout_secs": 5,
                "retry_delay_ms": 50
            },
            "output": {
                "max_results": 20,
                "max_sites": 100
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.upstream.base_url, "http://localhost:8080");
        assert_eq!(config.upstream.api_key_env, "MY_MP_KEY");
        assert_eq!(config.upstream.timeout_secs, 5);
        assert_eq!(config.upstream.retry_delay_ms, 50);
        assert_eq!(config.output.max_results, 20);
        assert_eq!(config.output.max_sites, 100);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn upstream_config_defaults() {
        let config = UpstreamConfig::default();
        assert_eq!(config.base_url, "https://api.materialsproject.org");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.retry_delay_ms, 500);
        assert_eq!(config.thermo_type, "GGA_GGA+U_R2SCAN");
    }

    #[test]
    fn reject_empty_thermo_type() {
        let json = r#"{ "upstream": { "thermo_type": " " } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn output_config_defaults() {
        let config = OutputConfig::default();
        assert_eq!(config.max_results, 50);
        assert_eq!(config.max_sites, 500);
    }

    #[test]
    fn logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn reject_bad_base_url() {
        let json = r#"{ "upstream": { "base_url": "ftp://example.org" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_zero_max_results() {
        let json = r#"{ "output": { "max_results": 0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
