use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::events::ChatMode;

/// Environment variable that overrides the configured endpoint
pub const ENDPOINT_ENV: &str = "ROBOCHAT_ENDPOINT";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat endpoint receiving `{ "message": ... }` posts
    pub endpoint: String,

    /// Per-request timeout enforced by the HTTP client
    pub request_timeout_secs: u64,

    /// Mode shown until the backend reports one
    pub default_mode: ChatMode,

    /// Robochat home directory
    #[serde(skip)]
    pub robochat_home: PathBuf,

    /// UI preferences
    pub ui: UiConfig,
}

/// UI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_timestamps: bool,
    pub tick_millis: u64, // typing indicator frame
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            tick_millis: 300,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            endpoint: "http://127.0.0.1:5000/api/chat".to_string(),
            request_timeout_secs: 120,
            default_mode: ChatMode::Langchain,
            robochat_home: home.join(".robochat"),
            ui: UiConfig::default(),
        }
    }
}

impl Config {
    /// Load `~/.robochat/config.toml`, falling back to defaults, then apply
    /// the environment override.
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let robochat_home = home.join(".robochat");

        let mut config = Self::load_from(&robochat_home.join("config.toml"))?;
        config.robochat_home = robochat_home;
        config.apply_endpoint_override(std::env::var(ENDPOINT_ENV).ok());

        Ok(config)
    }

    /// Read a config file, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        if let Some(parent) = path.parent() {
            config.robochat_home = parent.to_path_buf();
        }
        Ok(config)
    }

    /// Save configuration to `config.toml` under the robochat home
    pub fn save(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.robochat_home)
            .context("Failed to create .robochat directory")?;

        let config_path = self.config_path();
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(config_path)
    }

    pub fn config_path(&self) -> PathBuf {
        self.robochat_home.join("config.toml")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.robochat_home.join("log")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Replace the endpoint when an override (env or CLI) is present and
    /// non-blank.
    pub fn apply_endpoint_override(&mut self, endpoint: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            self.endpoint = endpoint.trim().to_string();
        }
    }
}
