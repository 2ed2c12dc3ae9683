//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError, GroupConfig};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "rosterkit.toml",
    "config.toml",
    "./config/rosterkit.toml",
    "/etc/rosterkit/config.toml",
];

/// Configuration loader
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable
    /// overrides, then validate it
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit variable lookup
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.find_config_file(&lookup) {
            Some(path) => {
                info!(?path, "Loading configuration from file");
                AppConfig::from_file(&path)?
            }
            None => AppConfig::default(),
        };

        apply_overrides(&mut config, &lookup);
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file<F>(&self, lookup: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Some(path) = lookup("ROSTERKIT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

fn apply_overrides<F>(config: &mut AppConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    // Service
    if let Some(val) = lookup("ROSTERKIT_SERVER_URL") {
        config.service.server_url = val;
    }
    if let Some(val) = lookup("ROSTERKIT_APP_ID") {
        config.service.app_id = val;
    }
    if let Some(val) = lookup("ROSTERKIT_APP_KEY") {
        config.service.app_key = val;
    }
    if let Some(val) = lookup("ROSTERKIT_TIMEOUT_MS") {
        if let Ok(timeout) = val.parse() {
            config.service.timeout_ms = timeout;
        }
    }

    // Procedures
    if let Some(val) = lookup("ROSTERKIT_PROCEDURE_MAX_ATTEMPTS") {
        if let Ok(attempts) = val.parse() {
            config.procedures.max_attempts = attempts;
        }
    }
    if let Some(val) = lookup("ROSTERKIT_PROCEDURE_RETRY_DELAY_MS") {
        if let Ok(delay) = val.parse() {
            config.procedures.retry_delay_ms = delay;
        }
    }

    // Groups, comma separated, indexed by position
    if let Some(val) = lookup("ROSTERKIT_GROUPS") {
        let names: Vec<&str> = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !names.is_empty() {
            config.groups = GroupConfig::from_names(names);
        }
    }
}
