//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which holds the backend URL, request timeout and last used login
//! identifier, and resolves it into the `ClientConfig` the transport uses.
//!
//! Configuration is stored at `~/.config/stockroom/config.json`. The
//! `STOCKROOM_API_URL` and `STOCKROOM_API_TIMEOUT_SECS` environment
//! variables take precedence over the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config directory paths
const APP_NAME: &str = "stockroom";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const API_URL_ENV: &str = "STOCKROOM_API_URL";
pub const TIMEOUT_ENV: &str = "STOCKROOM_API_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub last_identifier: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Resolve against the process environment.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::resolve(self, |key| std::env::var(key).ok())
    }
}

/// Settings fixed for the lifetime of an `ApiClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL with no trailing slash
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Environment first, then the config file, then the defaults.
    pub fn resolve<F>(file: &Config, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = normalize_base_url(env(API_URL_ENV).as_deref())
            .or_else(|| normalize_base_url(file.api_url.as_deref()))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let env_timeout = env(TIMEOUT_ENV).and_then(|raw| match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Some(secs),
            _ => {
                warn!(value = %raw, "Ignoring invalid {}", TIMEOUT_ENV);
                None
            }
        });
        let timeout_secs = env_timeout
            .or(file.timeout_secs.filter(|secs| *secs > 0))
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Trim and drop trailing slashes; blank means unset.
fn normalize_base_url(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
