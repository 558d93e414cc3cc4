//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the backend base URL, the last email used to sign in, the selected tenant
//! and the HTTP timeout.
//!
//! Configuration is stored at `~/.config/mentorhub/config.json`. The
//! `MENTORHUB_BASE_URL` environment variable overrides the stored base URL.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_REQUEST_TIMEOUT_SECS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "mentorhub";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides `base_url`
pub const BASE_URL_ENV: &str = "MENTORHUB_BASE_URL";

/// Backend used when nothing else is configured
const DEFAULT_BASE_URL: &str = "http://localhost:3333";

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub last_email: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            last_email: None,
            tenant_id: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
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

    /// Base URL from the environment, then the config file, then the default.
    pub fn resolved_base_url(&self) -> String {
        std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Root of everything cached for this application.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Profile directory holding the cookie jar shared by all tabs.
    pub fn profile_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("profile"))
    }

    /// Query cache directory, separated per tenant.
    pub fn query_cache_dir(&self) -> Result<PathBuf> {
        let mut path = self.cache_dir()?.join("queries");
        if let Some(ref tenant) = self.tenant_id {
            path = path.join(tenant);
        }
        Ok(path)
    }
}
