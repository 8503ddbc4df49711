//! TOML configuration for fuzzreq

use crate::error::CliError;
use crate::logging::{levels, LoggingConfig};
use fuzzy_engine::FuzzerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the HTTP sender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
    /// Scheme used when the request line holds only a path
    pub default_scheme: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            accept_invalid_certs: true,
            default_scheme: "http".to_string(),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub fuzzer: FuzzerConfig,
    pub logging: LoggingConfig,
    pub http: HttpConfig,
}

impl CliConfig {
    /// Read and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|reason| CliError::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        let config: CliConfig = toml::from_str(content).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.fuzzer.validate().map_err(|e| e.to_string())?;

        if !levels::is_valid_level(&self.logging.level) {
            return Err(format!(
                "unknown log level '{}', expected one of {}",
                self.logging.level,
                levels::valid_levels().join(", ")
            ));
        }
        for (module, level) in &self.logging.module_levels {
            if !levels::is_valid_level(level) {
                return Err(format!("unknown log level '{}' for module {}", level, module));
            }
        }

        if self.http.timeout_secs == 0 {
            return Err("http.timeout_secs must be greater than 0".to_string());
        }
        if !matches!(self.http.default_scheme.as_str(), "http" | "https") {
            return Err(format!(
                "http.default_scheme must be http or https, not '{}'",
                self.http.default_scheme
            ));
        }

        Ok(())
    }
}
