//! RosterKit Configuration System
//!
//! TOML-based configuration with environment variable override support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub procedures: ProcedureConfig,

    /// Groups seeded when the first account bootstraps the application.
    /// Ordered; indices must be `0..n`.
    pub groups: Vec<GroupConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            procedures: ProcedureConfig::default(),
            groups: vec![GroupConfig::new(0, "Default")],
        }
    }
}

/// Remote data service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the REST API (without the `/1.1` prefix)
    pub server_url: String,
    /// Application id sent as `X-LC-Id`
    pub app_id: String,
    /// Application key sent as `X-LC-Key`
    pub app_key: String,
    /// HTTP request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            app_id: String::new(),
            app_key: String::new(),
            timeout_ms: 30000,
        }
    }
}

/// Remote procedure retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcedureConfig {
    /// Total attempts per invocation, first attempt included
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for ProcedureConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_ms: 15000,
        }
    }
}

/// A group definition from the static group list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub index: u32,
    pub name: String,
}

impl GroupConfig {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }

    /// Build an ordered group list from names, assigning indices by position.
    pub fn from_names<I, S>(names: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .enumerate()
            .map(|(index, name)| Self::new(index as u32, name))
            .collect()
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override, then validate
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Check the invariants the provisioning layer relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.groups.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one group must be configured".to_string(),
            ));
        }

        for (position, group) in self.groups.iter().enumerate() {
            if group.index as usize != position {
                return Err(ConfigError::ValidationError(format!(
                    "group '{}' has index {} but is at position {}; indices must be contiguous from 0",
                    group.name, group.index, position
                )));
            }
            if group.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "group at index {} has an empty name",
                    group.index
                )));
            }
        }

        if self.procedures.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "procedures.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# RosterKit Configuration
# Environment variables (ROSTERKIT_*) override these settings

[service]
server_url = "http://localhost:3000"
app_id = ""
app_key = ""
timeout_ms = 30000

[procedures]
max_attempts = 5        # total attempts, first one included
retry_delay_ms = 15000  # fixed delay between attempts

# Groups seeded when the first account signs up.
# Indices must run 0..n in order; the first group becomes the
# administrator's group.
[[groups]]
index = 0
name = "Core"

[[groups]]
index = 1
name = "Ops"
"#
        .to_string()
    }
}
