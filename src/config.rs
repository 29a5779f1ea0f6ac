//! Configuration management for songgen.
//!
//! Configuration is loaded from `~/.config/songgen/config.toml`. The API key
//! and base URL may instead come from `MUREKA_API_KEY` / `MUREKA_API_URL`
//! (a `.env` file in the working directory is honoured). Everything is
//! resolved once at startup into a [`ClientConfig`] and a [`PollPolicy`].

use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::DEFAULT_PROMPT;

pub const API_KEY_ENV: &str = "MUREKA_API_KEY";
pub const API_URL_ENV: &str = "MUREKA_API_URL";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Provider endpoint and credentials.
    #[serde(default)]
    pub api: ApiConfig,
    /// Defaults for new generation requests.
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Status polling behaviour.
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the provider (prefer MUREKA_API_URL env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// API key (prefer MUREKA_API_KEY env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Style prompt when none is given on the command line.
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
        }
    }
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between status checks (default: 10).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Status checks before giving up (default: 90).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_interval_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    90
}

/// Endpoint and credentials a `JobClient` is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL the endpoint paths are appended to.
    pub base_url: Url,
    pub api_key: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>) -> Result<Self> {
        let raw = base_url.as_ref().trim().trim_end_matches('/');
        let base_url =
            Url::parse(raw).with_context(|| format!("Invalid API base URL: {}", raw))?;
        if base_url.cannot_be_a_base() {
            bail!("API base URL cannot have paths appended: {}", raw);
        }

        Ok(Self {
            base_url,
            api_key: api_key.into(),
            timeout: Duration::from_secs(default_timeout_secs()),
        })
    }
}

/// How a job is waited on: fixed delay, bounded number of checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Result<Self> {
        if max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        Ok(Self {
            interval,
            max_attempts,
        })
    }
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("songgen"))
            .context("Could not determine config directory")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default path, using defaults if not found.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, using defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Resolve endpoint and credentials, falling back to the environment.
    pub fn client_config(&self) -> Result<ClientConfig> {
        self.client_config_with(|key| std::env::var(key).ok())
    }

    /// Like [`Config::client_config`] with an explicit environment lookup.
    pub fn client_config_with<F>(&self, env: F) -> Result<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = non_empty(self.api.api_key.clone())
            .or_else(|| non_empty(env(API_KEY_ENV)))
            .with_context(|| {
                format!("API key not found. Set {API_KEY_ENV} or add api_key to [api] in the config file.")
            })?;
        let base_url = non_empty(self.api.base_url.clone())
            .or_else(|| non_empty(env(API_URL_ENV)))
            .with_context(|| {
                format!("API base URL not found. Set {API_URL_ENV} or add base_url to [api] in the config file.")
            })?;

        if self.api.timeout_secs == 0 {
            bail!("timeout_secs in [api] must be at least 1");
        }

        let mut client = ClientConfig::new(base_url, api_key)?;
        client.timeout = Duration::from_secs(self.api.timeout_secs);
        Ok(client)
    }

    /// Polling policy from the config file.
    pub fn poll_policy(&self) -> Result<PollPolicy> {
        PollPolicy::new(
            Duration::from_secs(self.polling.interval_secs),
            self.polling.max_attempts,
        )
        .context("Invalid [polling] section")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
