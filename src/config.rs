//! Gateway configuration.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. the CLI's `--config <path>`)
//! 2. `~/.sluice/config.toml` (user)
//! 3. `/etc/sluice/config.toml` (system)
//!
//! The provider API key is read from `provider.api_key` if present, otherwise
//! from the environment variable named by `provider.api_key_env`
//! (default `OPENAI_API_KEY`). Configuration is read once at startup and is
//! immutable afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{CacheConfig, EvictionPolicy};
use crate::cost::{CostModel, ModelCostRate};
use crate::{Result, SluiceError};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Master switch. A disabled gateway answers every call with `None`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub cache: CacheSection,
    /// Per-operation overrides keyed by operation name.
    #[serde(default)]
    pub operations: HashMap<String, OperationConfig>,
    /// Extra or replacement cost rates keyed by model.
    #[serde(default)]
    pub pricing: HashMap<String, RateConfig>,
    #[serde(default)]
    pub usage: UsageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: ProviderConfig::default(),
            defaults: DefaultsConfig::default(),
            cache: CacheSection::default(),
            operations: HashMap::new(),
            pricing: HashMap::new(),
            usage: UsageConfig::default(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// LLM provider connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible API (default: https://api.openai.com/v1).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Inline API key. Prefer `api_key_env` outside of local testing.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key (default: OPENAI_API_KEY).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Model used when an operation does not name one (default: gpt-4o-mini).
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Per-call timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            request_timeout_secs: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    crate::providers::openai::DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl ProviderConfig {
    /// Inline key, falling back to the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Bounds applied to calls that do not come from a template.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    /// Default max output tokens (default: 500).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Default temperature (default: 0.3).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.3
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Capacity threshold (default: 1000).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// TTL for operations without an override (default: 3600).
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Prompt characters hashed into cache keys (default: 2000).
    #[serde(default = "default_key_prefix_chars")]
    pub key_prefix_chars: usize,
    /// "expired-sweep" (default) or "lru".
    #[serde(default)]
    pub eviction: EvictionPolicy,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            default_ttl_secs: default_ttl_secs(),
            key_prefix_chars: default_key_prefix_chars(),
            eviction: EvictionPolicy::default(),
        }
    }
}

fn default_max_entries() -> usize {
    crate::cache::DEFAULT_MAX_ENTRIES
}

fn default_ttl_secs() -> u64 {
    crate::cache::DEFAULT_TTL.as_secs()
}

fn default_key_prefix_chars() -> usize {
    crate::cache::DEFAULT_KEY_PREFIX_CHARS
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        CacheConfig::new()
            .max_entries(section.max_entries)
            .default_ttl(Duration::from_secs(section.default_ttl_secs))
            .key_prefix_chars(section.key_prefix_chars)
            .eviction(section.eviction)
    }
}

/// Per-operation overrides. Unset fields fall back to the template/defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OperationConfig {
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Price override in USD per 1000 tokens.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct RateConfig {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// `[usage]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageConfig {
    /// JSON-lines file for usage records. In-memory when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            SluiceError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            SluiceError::Configuration(msg) => {
                SluiceError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SluiceError::Configuration(format!("Failed to parse config: {e}")))
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(SluiceError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".sluice").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/sluice/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(SluiceError::Configuration(
            "No config file found. Create ~/.sluice/config.toml or /etc/sluice/config.toml"
                .to_string(),
        ))
    }

    /// Default rate table with `[pricing]` overrides applied.
    pub fn cost_model(&self) -> CostModel {
        let mut model = CostModel::default();
        for (name, rate) in &self.pricing {
            model.set_rate(name.clone(), ModelCostRate::new(rate.input_per_1k, rate.output_per_1k));
        }
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert!(config.enabled);
        assert_eq!(config.provider.default_model, "gpt-4o-mini");
        assert_eq!(config.provider.request_timeout_secs, 30);
        assert_eq!(config.cache.max_entries, 1_000);
        assert_eq!(config.cache.default_ttl_secs, 3_600);
        assert_eq!(config.cache.eviction, EvictionPolicy::ExpiredSweep);
    }

    #[test]
    fn parse_minimal_config() {
        let config = Config::from_toml_str("enabled = false").unwrap();
        assert!(!config.enabled);
        // Defaults preserved
        assert_eq!(config.defaults.max_tokens, 500);
        assert!(config.operations.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            enabled = true

            [provider]
            base_url = "http://localhost:8080/v1/"
            api_key = "sk-test"
            default_model = "gpt-4o"
            request_timeout_secs = 10

            [defaults]
            max_tokens = 256
            temperature = 0.1

            [cache]
            max_entries = 50
            default_ttl_secs = 60
            key_prefix_chars = 400
            eviction = "lru"

            [operations.issue_summary]
            cache_ttl_secs = 7200
            model = "gpt-4o-mini"

            [pricing.my-local-model]
            input_per_1k = 0.0
            output_per_1k = 0.0

            [usage]
            path = "/var/lib/sluice/usage.jsonl"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.provider.api_key(), Some("sk-test".to_string()));
        assert_eq!(config.provider.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.defaults.max_tokens, 256);
        assert_eq!(config.cache.eviction, EvictionPolicy::Lru);
        assert_eq!(config.cache.key_prefix_chars, 400);

        let op = &config.operations["issue_summary"];
        assert_eq!(op.cache_ttl_secs, Some(7200));
        assert_eq!(op.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(op.max_tokens, None);

        assert!(config.cost_model().rate("my-local-model").is_some());
        assert_eq!(
            config.usage.path,
            Some(PathBuf::from("/var/lib/sluice/usage.jsonl"))
        );
    }

    #[test]
    fn unknown_eviction_policy_is_rejected() {
        let result = Config::from_toml_str("[cache]\neviction = \"fifo\"");
        assert!(matches!(result, Err(SluiceError::Configuration(_))));
    }

    #[test]
    fn blank_inline_key_counts_as_missing() {
        let config = Config::from_toml_str(
            "[provider]\napi_key = \"  \"\napi_key_env = \"SLUICE_TEST_UNSET_KEY_VAR\"",
        )
        .unwrap();
        assert_eq!(config.provider.api_key(), None);
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[provider]\ndefault_model = \"gpt-4-turbo\"").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.provider.default_model, "gpt-4-turbo");
    }
}
