//! Configuration management for llama-stream
//!
//! Supports configuration via:
//! 1. Config file (~/.config/llama-stream/config.toml)
//! 2. Environment variables (LLAMA_STREAM_API_KEY, REPLICATE_API_TOKEN, LLAMA_STREAM_ENDPOINT)
//! 3. CLI arguments (override file/env settings)
//!
//! Only the binary reads this; the library takes endpoint and key directly.

use crate::api::{Connector, GenerationOverrides, DEFAULT_CHANNEL_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_API_URL: &str =
    "https://api.replicate.com/v1/models/meta/llama-2-13b-chat/predictions";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const API_KEY_VARS: [&str; 2] = ["LLAMA_STREAM_API_KEY", "REPLICATE_API_TOKEN"];
const API_URL_VAR: &str = "LLAMA_STREAM_ENDPOINT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Endpoint and credentials
    pub connector: ConnectorSettings,

    /// Default generation parameters
    pub generation: GenerationSettings,
}

/// Endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorSettings {
    /// Predictions endpoint
    pub api_url: String,

    /// API token (can also use LLAMA_STREAM_API_KEY or REPLICATE_API_TOKEN)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Fragments buffered between the reader and the consumer
    pub channel_capacity: usize,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Generation defaults applied when the CLI doesn't set them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub system_prompt: String,

    #[serde(flatten)]
    pub overrides: GenerationOverrides,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            overrides: GenerationOverrides::default(),
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("llama-stream")
            .join("config.toml")
    }

    /// Load config from specific path; a missing file yields the defaults
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = API_KEY_VARS.iter().find_map(|name| lookup(name)) {
            self.connector.api_key = Some(key);
        }
        if let Some(url) = lookup(API_URL_VAR) {
            self.connector.api_url = url;
        }
        self
    }

    /// Save config to specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connector.api_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired("connector.api_url".to_string()));
        }
        if self.api_key().is_none() {
            return Err(ConfigError::MissingRequired(format!(
                "API key (set connector.api_key or {})",
                API_KEY_VARS.join(" / ")
            )));
        }
        Ok(())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.connector
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    /// Build a connector from the validated settings
    pub fn connector(&self) -> Result<Connector, ConfigError> {
        self.validate()?;
        let api_key = self.api_key().unwrap_or_default();
        Ok(Connector::new(self.connector.api_url.clone(), api_key)
            .with_channel_capacity(self.connector.channel_capacity))
    }

    /// Copy with the API key replaced by `***`, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.connector.api_key.is_some() {
            config.connector.api_key = Some("***".to_string());
        }
        config
    }

    /// Generate example config content
    pub fn example() -> String {
        let example = Config::default();
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.connector.api_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.connector.api_key = Some(key.into());
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.connector.channel_capacity = capacity;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.generation.system_prompt = prompt.into();
        self
    }

    pub fn overrides(mut self, overrides: GenerationOverrides) -> Self {
        self.config.generation.overrides = overrides;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
