//! Configuration management for generation backends
//!
//! This module provides utilities for loading and validating configuration
//! for the generation backends and the retry loop, with support for
//! environment variables.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};

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
            GenerationError::configuration(format!("Invalid value for key {}: {}", key, e))
        })
    }

    /// Get a typed configuration value, falling back when missing or malformed
    fn get_or<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        match self.get::<T>(key) {
            Ok(value) => value,
            Err(GenerationError::Configuration(msg)) if msg.starts_with("Invalid value") => {
                log::warn!("{}, using default", msg);
                default
            }
            Err(_) => default,
        }
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(GenerationError::configuration(format!(
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
    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "LLAMA", "OPENAI")
    namespace: Option<String>,
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

    /// Set a namespace for environment variables
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    pub(crate) fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        if let Some(ref namespace) = self.namespace {
            env_key.push_str(namespace);
            env_key.push('_');
        }

        // uppercase, non-alphanumerics become underscores
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
            env::VarError::NotPresent => GenerationError::configuration(format!(
                "Environment variable not set: {}",
                env_key
            )),
            env::VarError::NotUnicode(_) => GenerationError::configuration(format!(
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

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values.get(key).cloned().ok_or_else(|| {
            GenerationError::configuration(format!("Configuration key not found: {}", key))
        })
    }
}

/// A composite config provider that tries multiple providers in order
#[derive(Default)]
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider to the end of the chain
    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Builder form of [`add_provider`](Self::add_provider)
    pub fn with_provider(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.add_provider(provider);
        self
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        for provider in &self.providers {
            if let Ok(value) = provider.get_string(key) {
                return Ok(value);
            }
        }

        Err(GenerationError::configuration(format!(
            "Configuration key not found in any provider: {}",
            key
        )))
    }
}

/// Global default configuration provider
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new().with_prefix("OSMOSIS")));

/// Trait for backend-specific configuration
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Service name
    fn service_name(&self) -> &str;
}

/// Sampling parameters shared by every backend.
///
/// Defaults are deterministic: temperature 0 and nucleus threshold 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    /// Output-length cap in tokens
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: 256,
        }
    }
}

impl SamplingConfig {
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            temperature: provider.get_or("temperature", defaults.temperature),
            top_p: provider.get_or("top_p", defaults.top_p),
            max_tokens: provider.get_or("n_predict", defaults.max_tokens),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(GenerationError::configuration(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) || self.top_p == 0.0 {
            return Err(GenerationError::configuration(format!(
                "top_p must be within (0.0, 1.0], got {}",
                self.top_p
            )));
        }
        if self.max_tokens == 0 {
            return Err(GenerationError::configuration("n_predict must be positive"));
        }
        Ok(())
    }
}

/// Configuration for the `llama-cli` process backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlamaCliConfig {
    /// Binary to spawn; a bare name is resolved through PATH
    pub binary: String,

    pub sampling: SamplingConfig,

    /// Layers to offload to the GPU, omitted from the command line when unset
    pub gpu_layers: Option<u32>,
}

impl Default for LlamaCliConfig {
    fn default() -> Self {
        Self {
            binary: "llama-cli".to_string(),
            sampling: SamplingConfig::default(),
            gpu_layers: None,
        }
    }
}

impl LlamaCliConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let binary = provider.get_string_or("llama_binary", "llama-cli");
        let sampling = SamplingConfig::from_provider(provider)?;
        let gpu_layers = provider.get::<u32>("gpu_layers").ok();

        let config = Self {
            binary,
            sampling,
            gpu_layers,
        };

        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig for LlamaCliConfig {
    fn validate(&self) -> Result<()> {
        if self.binary.trim().is_empty() {
            return Err(GenerationError::configuration("llama-cli binary path is required"));
        }
        self.sampling.validate()
    }

    fn service_name(&self) -> &str {
        "llama-cli"
    }
}

/// Configuration for an OpenAI-compatible local server (llama-server, LM Studio)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiCompatConfig {
    /// Base URL including the version segment, e.g. `http://localhost:8080/v1`
    pub base_url: String,

    /// Sent as a bearer token when present
    pub api_key: Option<String>,

    pub timeout_seconds: u64,

    pub sampling: SamplingConfig,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v1".to_string(),
            api_key: None,
            timeout_seconds: 120,
            sampling: SamplingConfig::default(),
        }
    }
}

impl OpenAiCompatConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let base_url = provider.get_string_or("openai_base_url", "http://localhost:8080/v1");
        let api_key = provider
            .get_string("openai_api_key")
            .ok()
            .filter(|k| !k.is_empty());
        let timeout_seconds = provider.get_or("openai_timeout_seconds", 120u64);
        let sampling = SamplingConfig::from_provider(provider)?;

        let config = Self {
            base_url,
            api_key,
            timeout_seconds,
            sampling,
        };

        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig for OpenAiCompatConfig {
    fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(GenerationError::configuration("OpenAI-compatible base URL is required"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(GenerationError::configuration(format!(
                "OpenAI-compatible base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(GenerationError::configuration("timeout must be positive"));
        }
        self.sampling.validate()
    }

    fn service_name(&self) -> &str {
        "openai-compat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config_provider() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("key1", "value1");
        provider.set("key2", "123");

        assert_eq!(provider.get_string("key1").unwrap(), "value1");
        assert_eq!(provider.get::<i64>("key2").unwrap(), 123);
        assert!(provider.get_string("key3").is_err());
    }

    #[test]
    fn test_env_key_formatting() {
        let provider = EnvConfigProvider::new()
            .with_prefix("OSMOSIS")
            .with_namespace("LLAMA");

        assert_eq!(provider.format_key("gpu_layers"), "OSMOSIS_LLAMA_GPU_LAYERS");
        assert_eq!(provider.format_key("top-p"), "OSMOSIS_LLAMA_TOP_P");
    }

    #[test]
    fn test_composite_config_provider() {
        let mut mem1 = MemoryConfigProvider::new();
        mem1.set("key1", "value1");

        let mut mem2 = MemoryConfigProvider::new();
        mem2.set("key1", "shadowed");
        mem2.set("key2", "value2");

        let provider = CompositeConfigProvider::new()
            .with_provider(mem1)
            .with_provider(mem2);

        assert_eq!(provider.get_string("key1").unwrap(), "value1");
        assert_eq!(provider.get_string("key2").unwrap(), "value2");
        assert!(provider.get_string("key3").is_err());
    }

    #[test]
    fn test_llama_cli_defaults() {
        let config = LlamaCliConfig::from_provider(&MemoryConfigProvider::new()).unwrap();
        assert_eq!(config, LlamaCliConfig::default());
        assert_eq!(config.sampling.temperature, 0.0);
        assert_eq!(config.sampling.top_p, 1.0);
        assert_eq!(config.sampling.max_tokens, 256);
        assert_eq!(config.gpu_layers, None);
    }

    #[test]
    fn test_llama_cli_overrides() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("llama_binary", "/opt/llama.cpp/main");
        provider.set("n_predict", "512");
        provider.set("gpu_layers", "10");

        let config = LlamaCliConfig::from_provider(&provider).unwrap();
        assert_eq!(config.binary, "/opt/llama.cpp/main");
        assert_eq!(config.sampling.max_tokens, 512);
        assert_eq!(config.gpu_layers, Some(10));
    }

    #[test]
    fn test_malformed_value_falls_back() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("n_predict", "lots");
        let config = SamplingConfig::from_provider(&provider).unwrap();
        assert_eq!(config.max_tokens, 256);
    }

    #[test]
    fn test_sampling_validation() {
        let config = SamplingConfig {
            top_p: 0.0,
            ..SamplingConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SamplingConfig {
            max_tokens: 0,
            ..SamplingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_openai_compat_config() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("openai_base_url", "http://127.0.0.1:1234/v1");
        provider.set("openai_api_key", "");

        let config = OpenAiCompatConfig::from_provider(&provider).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:1234/v1");
        assert_eq!(config.api_key, None);
        assert_eq!(config.timeout_seconds, 120);

        let config = OpenAiCompatConfig {
            base_url: "localhost:8080".to_string(),
            ..OpenAiCompatConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
