//! Configuration management for the classifier
//!
//! Values come from a `ConfigProvider`, normally environment variables with a
//! `CLASSIFIER_` prefix. Every config type validates itself before use so a
//! bad setting is reported before any complaint is submitted.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result, TransientKind};
use crate::runner::ChunkSizing;

/// Default per-call timeout for backend requests
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// Consecutive failed rows that stop a per-row run
pub const DEFAULT_PER_ROW_STOP_THRESHOLD: usize = 20;

/// Consecutive failed chunks that stop a chunked run
pub const DEFAULT_CHUNKED_STOP_THRESHOLD: usize = 5;

/// Token budget per batched request
pub const DEFAULT_TOKEN_BUDGET: usize = 8000;

/// Upper bound on rows per chunk
pub const DEFAULT_CHUNK_CAP: usize = 100;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a typed configuration value by parsing from string
    fn get<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        let value = self.get_string(key)?;
        value.trim().parse::<T>().map_err(|e| {
            ClassifierError::configuration(format!("Invalid value for key {}: {}", key, e))
        })
    }

    /// Get a typed value, falling back to `default` only when the key is absent.
    ///
    /// A present but unparsable value is an error rather than a silent default.
    fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        match self.get_string(key) {
            Ok(_) => self.get(key),
            Err(_) => Ok(default),
        }
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ClassifierError::configuration(format!(
                "Invalid boolean value for key {}: {}",
                key, value
            ))),
        }
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get a boolean configuration value with a default
    fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get_string(key) {
            Ok(_) => self.get_bool(key),
            Err(_) => Ok(default),
        }
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        env_key.push_str(
            &key.to_uppercase()
                .replace(|c: char| !c.is_ascii_alphanumeric(), "_"),
        );

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => ClassifierError::configuration(format!(
                "Environment variable not set: {}",
                env_key
            )),
            env::VarError::NotUnicode(_) => ClassifierError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }

    /// Builder-style variant of `set`
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: ToString,
    {
        self.set(key, value);
        self
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values.get(key).cloned().ok_or_else(|| {
            ClassifierError::configuration(format!("Configuration key not found: {}", key))
        })
    }
}

/// Global default configuration provider
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new().with_prefix("CLASSIFIER")));

/// Trait for validated configuration sections
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;
}

/// Supported backend providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions
    OpenAi,
    /// Google Gemini generateContent
    Gemini,
}

impl ProviderKind {
    /// Default API root for the provider
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Default model identifier for the provider
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Gemini => "gemini-2.5-flash",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(ClassifierError::configuration(format!(
                "Unknown provider: {}",
                other
            ))),
        }
    }
}

/// Connection settings for the language-model backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Which provider API to speak
    pub provider: ProviderKind,

    /// API key
    pub api_key: String,

    /// API root URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Per-call timeout in seconds
    pub timeout_seconds: u64,

    /// Sampling temperature
    pub temperature: f32,

    /// Output token limit for a single-item call
    pub max_tokens: u32,
}

impl BackendConfig {
    /// Defaults for a provider, without an API key
    pub fn for_provider(provider: ProviderKind) -> Self {
        Self {
            provider,
            api_key: String::new(),
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            temperature: 0.2,
            max_tokens: 256,
        }
    }

    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let kind = provider.get_or("provider", ProviderKind::OpenAi)?;
        let defaults = Self::for_provider(kind);

        let config = Self {
            provider: kind,
            api_key: provider.get_string("api_key")?,
            base_url: provider.get_string_or("base_url", &defaults.base_url),
            model: provider.get_string_or("model", &defaults.model),
            timeout_seconds: provider.get_or("timeout_seconds", defaults.timeout_seconds)?,
            temperature: provider.get_or("temperature", defaults.temperature)?,
            max_tokens: provider.get_or("max_tokens", defaults.max_tokens)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl ServiceConfig for BackendConfig {
    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ClassifierError::configuration("API key is required"));
        }

        url::Url::parse(&self.base_url).map_err(|e| {
            ClassifierError::configuration(format!("Invalid base URL {}: {}", self.base_url, e))
        })?;

        if self.model.trim().is_empty() {
            return Err(ClassifierError::configuration("Model identifier is required"));
        }

        if self.timeout_seconds == 0 {
            return Err(ClassifierError::configuration("Timeout must be positive"));
        }

        Ok(())
    }
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first call
    pub max_attempts: u32,

    /// Wait before the first retry
    pub min_wait: Duration,

    /// Ceiling for any single wait
    pub max_wait: Duration,

    /// Growth factor between waits
    pub multiplier: f64,

    /// Jitter applied to each wait (0 disables it)
    pub randomization_factor: f64,

    /// Transient kinds that are retried; others surface immediately
    pub retry_on: Vec<TransientKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_wait: Duration::from_secs(4),
            max_wait: Duration::from_secs(60),
            multiplier: 2.0,
            randomization_factor: 0.0,
            retry_on: vec![
                TransientKind::QuotaExceeded,
                TransientKind::TooManyRequests,
                TransientKind::ServiceUnavailable,
                TransientKind::InternalServerError,
            ],
        }
    }
}

impl RetryConfig {
    /// Load retry settings; `None` when retries are disabled
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Option<Self>> {
        if !provider.get_bool_or("retry_enabled", true)? {
            return Ok(None);
        }

        let defaults = Self::default();
        let config = Self {
            max_attempts: provider.get_or("retry_max_attempts", defaults.max_attempts)?,
            min_wait: Duration::from_secs(
                provider.get_or("retry_min_wait_secs", defaults.min_wait.as_secs())?,
            ),
            max_wait: Duration::from_secs(
                provider.get_or("retry_max_wait_secs", defaults.max_wait.as_secs())?,
            ),
            ..defaults
        };

        config.validate()?;
        Ok(Some(config))
    }
}

impl ServiceConfig for RetryConfig {
    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ClassifierError::configuration(
                "Retry policy needs at least one attempt",
            ));
        }

        if self.min_wait > self.max_wait {
            return Err(ClassifierError::configuration(format!(
                "Retry min wait {:?} exceeds max wait {:?}",
                self.min_wait, self.max_wait
            )));
        }

        if self.multiplier < 1.0 {
            return Err(ClassifierError::configuration("Retry multiplier must be >= 1"));
        }

        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(ClassifierError::configuration(
                "Retry randomization factor must be within [0, 1]",
            ));
        }

        Ok(())
    }
}

/// How rows are grouped into backend calls
#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    /// One call per row
    PerRow,
    /// One call per contiguous chunk of rows
    Chunked(ChunkSizing),
}

/// Settings for one classification run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Per-row or chunked processing
    pub mode: RunMode,

    /// Consecutive failed units that abort the run
    pub stop_threshold: usize,

    /// Pause between units
    pub inter_call_delay: Duration,
}

impl RunConfig {
    /// Per-row run with the reference threshold and no delay
    pub fn per_row() -> Self {
        Self {
            mode: RunMode::PerRow,
            stop_threshold: DEFAULT_PER_ROW_STOP_THRESHOLD,
            inter_call_delay: Duration::ZERO,
        }
    }

    /// Chunked run with the reference threshold and no delay
    pub fn chunked(sizing: ChunkSizing) -> Self {
        Self {
            mode: RunMode::Chunked(sizing),
            stop_threshold: DEFAULT_CHUNKED_STOP_THRESHOLD,
            inter_call_delay: Duration::ZERO,
        }
    }

    /// Override the stop threshold
    pub fn with_stop_threshold(mut self, threshold: usize) -> Self {
        self.stop_threshold = threshold;
        self
    }

    /// Override the inter-call delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.inter_call_delay = delay;
        self
    }

    /// Load run settings from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let mode = provider.get_string_or("mode", "per_row");
        let base = match mode.trim().to_lowercase().as_str() {
            "per_row" | "row" | "single" => Self::per_row(),
            "chunked" | "batch" => {
                let sizing = match provider.get_string("chunk_size") {
                    Ok(_) => ChunkSizing::Fixed(provider.get("chunk_size")?),
                    Err(_) => ChunkSizing::token_budget(
                        provider.get_or("token_budget", DEFAULT_TOKEN_BUDGET)?,
                        provider.get_or("chunk_cap", DEFAULT_CHUNK_CAP)?,
                    ),
                };
                Self::chunked(sizing)
            }
            other => {
                return Err(ClassifierError::configuration(format!(
                    "Unknown run mode: {}",
                    other
                )))
            }
        };

        let config = Self {
            stop_threshold: provider.get_or("stop_threshold", base.stop_threshold)?,
            inter_call_delay: Duration::from_millis(provider.get_or("delay_ms", 0u64)?),
            ..base
        };

        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig for RunConfig {
    fn validate(&self) -> Result<()> {
        if self.stop_threshold == 0 {
            return Err(ClassifierError::configuration(
                "Stop threshold must be at least 1",
            ));
        }

        if let RunMode::Chunked(sizing) = &self.mode {
            sizing.resolve()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config_provider() {
        let provider = MemoryConfigProvider::new()
            .with("key1", "value1")
            .with("key2", "123");

        assert_eq!(provider.get_string("key1").unwrap(), "value1");
        assert_eq!(provider.get::<i64>("key2").unwrap(), 123);
        assert!(provider.get_string("key3").is_err());
        assert_eq!(provider.get_or("key3", 7u32).unwrap(), 7);
        assert!(provider.get_or("key1", 7u32).is_err());
    }

    #[test]
    fn test_env_config_provider_key_format() {
        let provider = EnvConfigProvider::new().with_prefix("CLASSIFIER");
        assert_eq!(provider.format_key("api_key"), "CLASSIFIER_API_KEY");
        assert_eq!(provider.format_key("base-url"), "CLASSIFIER_BASE_URL");
    }

    #[test]
    fn test_backend_config_defaults_per_provider() {
        let provider = MemoryConfigProvider::new()
            .with("provider", "gemini")
            .with("api_key", "secret");

        let config = BackendConfig::from_provider(&provider).unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.timeout(), Duration::from_secs(120));
        assert_eq!(config.max_tokens, 256);
    }

    #[test]
    fn test_backend_config_requires_api_key() {
        let provider = MemoryConfigProvider::new();
        assert!(BackendConfig::from_provider(&provider).is_err());

        let config = BackendConfig::for_provider(ProviderKind::OpenAi);
        assert!(matches!(
            config.validate(),
            Err(ClassifierError::Configuration(_))
        ));
    }

    #[test]
    fn test_backend_config_rejects_bad_url() {
        let config = BackendConfig {
            api_key: "k".to_string(),
            base_url: "not a url".to_string(),
            ..BackendConfig::for_provider(ProviderKind::OpenAi)
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_config_can_be_disabled() {
        let provider = MemoryConfigProvider::new().with("retry_enabled", "false");
        assert!(RetryConfig::from_provider(&provider).unwrap().is_none());

        let provider = MemoryConfigProvider::new().with("retry_max_attempts", "3");
        let config = RetryConfig::from_provider(&provider).unwrap().unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.min_wait, Duration::from_secs(4));
    }

    #[test]
    fn test_run_config_modes() {
        let config = RunConfig::from_provider(&MemoryConfigProvider::new()).unwrap();
        assert_eq!(config.mode, RunMode::PerRow);
        assert_eq!(config.stop_threshold, 20);

        let provider = MemoryConfigProvider::new()
            .with("mode", "chunked")
            .with("chunk_size", "10")
            .with("delay_ms", "250");
        let config = RunConfig::from_provider(&provider).unwrap();
        assert_eq!(config.mode, RunMode::Chunked(ChunkSizing::Fixed(10)));
        assert_eq!(config.stop_threshold, 5);
        assert_eq!(config.inter_call_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_run_config_rejects_impossible_budget() {
        let provider = MemoryConfigProvider::new()
            .with("mode", "chunked")
            .with("token_budget", "10");
        assert!(matches!(
            RunConfig::from_provider(&provider),
            Err(ClassifierError::Configuration(_))
        ));

        let config = RunConfig::per_row().with_stop_threshold(0);
        assert!(config.validate().is_err());
    }
}
