//! Configuration system for Studylink.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// Main configuration struct for Studylink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Evaluation service settings
    pub service: ServiceConfig,
    /// Resource limits
    pub limits: LimitsConfig,
}

/// Settings for the upstream evaluation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the evaluation service.
    pub base_url: String,
    /// Model forwarded with requests that do not pick one themselves.
    pub default_model: Option<String>,
    /// Attach report PDFs to evaluations by default.
    pub include_pdf: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            default_model: None,
            include_pdf: false,
        }
    }
}

/// Resource limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum sessions allowed to stream simultaneously.
    pub max_concurrent_sessions: usize,
    /// Timeout for establishing the HTTP connection, in seconds.
    ///
    /// Applies to the connection only; an open stream is never timed out
    /// by the orchestrator.
    pub connect_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 4,
            connect_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Directory holding the user-level config file.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("studylink")
    }

    /// Load configuration from all sources.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            // Default values
            .merge(Serialized::defaults(Config::default()))
            // User config
            .merge(Toml::file(Self::config_dir().join("config.toml")))
            // Project config
            .merge(Toml::file(".studylink/config.toml"))
            // Environment variables
            .merge(Env::prefixed("STUDYLINK_").split("_"))
            .extract()
    }

    /// Load and validate configuration.
    pub fn load_validated() -> Result<Self, Error> {
        let config = Self::load().map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), Error> {
        let mut problems = Vec::new();

        if !self.service.base_url.starts_with("http://")
            && !self.service.base_url.starts_with("https://")
        {
            problems.push("service.base_url must start with http:// or https://".to_string());
        }

        if self.limits.max_concurrent_sessions == 0 {
            problems.push("limits.max_concurrent_sessions must be greater than 0".to_string());
        }

        if self.limits.max_concurrent_sessions > 16 {
            tracing::warn!(
                max_concurrent_sessions = self.limits.max_concurrent_sessions,
                "very high session cap; each session holds an open connection"
            );
        }

        if self.limits.connect_timeout_secs == 0 {
            problems.push("limits.connect_timeout_secs must be greater than 0".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Configuration validation failed:\n  {}",
                problems.join("\n  ")
            )))
        }
    }
}
