//! TOML configuration loading and API key resolution
//!
//! Priority order for every setting:
//! 1. Command-line argument (applied by the binary)
//! 2. Environment variable (API key only)
//! 3. TOML config file
//! 4. Built-in defaults (code constants)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable holding the completion API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Optional prompt template overrides
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Completion model settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Model identifier sent with every request
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (the environment variable takes precedence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            temperature: default_temperature(),
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Retry/backoff settings for model calls
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: f64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            multiplier: default_multiplier(),
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

/// Fan-out limits for the concurrent mode
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConcurrencyConfig {
    /// Maximum simultaneously outstanding model calls
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Optional request quota applied to every attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            requests_per_minute: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
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

/// Prompt template overrides; unset parts use the built-in template
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PromptConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fewshot: Option<String>,

    /// Must contain both the lyrics and the annotation markers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

fn default_model_name() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_min_delay_secs() -> f64 {
    2.0
}

fn default_max_delay_secs() -> f64 {
    10.0
}

fn default_max_in_flight() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Reject values that cannot drive a run
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        let retry = &self.retry;
        if !retry.multiplier.is_finite() || retry.multiplier < 0.0 {
            return Err(Error::Config(format!(
                "retry.multiplier must be a finite value >= 0, got {}",
                retry.multiplier
            )));
        }
        // Comparisons are false for NaN, so test finiteness first
        if !retry.min_delay_secs.is_finite()
            || !retry.max_delay_secs.is_finite()
            || retry.min_delay_secs < 0.0
            || retry.max_delay_secs < retry.min_delay_secs
        {
            return Err(Error::Config(format!(
                "retry delays must be finite with 0 <= min_delay_secs ({}) <= max_delay_secs ({})",
                retry.min_delay_secs, retry.max_delay_secs
            )));
        }
        if self.concurrency.max_in_flight == 0 {
            return Err(Error::Config(
                "concurrency.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.concurrency.requests_per_minute == Some(0) {
            return Err(Error::Config(
                "concurrency.requests_per_minute must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default config file location: `<config_dir>/lyref/lyref.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lyref").join("lyref.toml"))
}

/// Load and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Toml(format!("{}: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Config file a run would load: the explicit path, else the default
/// location if that file exists
pub fn locate_config(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|path| path.exists()),
    }
}

/// Load config from an explicit path, else the default location, else defaults
///
/// An explicit path that does not exist is an error; a missing default file is not.
/// Does not log, so it can run before the subscriber is installed.
pub fn resolve_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    match locate_config(explicit) {
        Some(path) => load_toml_config(&path),
        None => Ok(TomlConfig::default()),
    }
}

/// Write config to TOML, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config).map_err(|e| Error::Toml(e.to_string()))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Resolve the completion API key
///
/// **Priority:** ENV → TOML
pub fn resolve_api_key(toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(API_KEY_ENV).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .model
        .api_key
        .as_ref()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "API key found in both {} and TOML config. Using environment (highest priority).",
            API_KEY_ENV
        );
    }

    if let Some(key) = env_key {
        info!("API key loaded from environment variable");
        return Ok(key);
    }

    if let Some(key) = toml_key {
        info!("API key loaded from TOML config");
        return Ok(key.clone());
    }

    Err(Error::Config(format!(
        "API key not configured. Set {} or add `api_key` under [model] in the TOML config",
        API_KEY_ENV
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
