//! Builder for configuring gateway instances

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::Gateway;
use crate::cache::{CacheBackend, CacheConfig};
use crate::config::{Config, OperationConfig};
use crate::cost::CostModel;
use crate::providers::openai::DEFAULT_BASE_URL;
use crate::providers::{CompletionProvider, OpenAiCompatibleProvider};
use crate::template::{PromptTemplate, TemplateRegistry};
use crate::usage::{JsonlUsageStore, MemoryUsageStore, UsageStore, UsageTracker};
use crate::{Result, SluiceError};

/// Default per-call timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Main entry point for creating gateway instances.
pub struct Sluice;

impl Sluice {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> SluiceBuilder {
        SluiceBuilder::new()
    }
}

/// Builder for configuring gateway instances.
pub struct SluiceBuilder {
    provider: Option<Arc<dyn CompletionProvider>>,
    openai_key: Option<String>,
    base_url: Option<String>,
    enabled: bool,
    templates: TemplateRegistry,
    cache_config: CacheConfig,
    cache_backend: Option<Arc<dyn CacheBackend>>,
    cost_model: CostModel,
    usage_store: Option<Arc<dyn UsageStore>>,
    default_model: String,
    default_max_tokens: u32,
    default_temperature: f32,
    operations: HashMap<String, OperationConfig>,
    timeout: Duration,
}

impl SluiceBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            openai_key: None,
            base_url: None,
            enabled: true,
            templates: TemplateRegistry::with_defaults(),
            cache_config: CacheConfig::default(),
            cache_backend: None,
            cost_model: CostModel::default(),
            usage_store: None,
            default_model: "gpt-4o-mini".to_string(),
            default_max_tokens: 500,
            default_temperature: 0.3,
            operations: HashMap::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Start from a loaded [`Config`].
    ///
    /// Reads the API key (inline or from the environment) and opens the
    /// usage file if one is configured.
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::new()
            .enabled(config.enabled)
            .base_url(config.provider.base_url.clone())
            .default_model(config.provider.default_model.clone())
            .default_max_tokens(config.defaults.max_tokens)
            .default_temperature(config.defaults.temperature)
            .timeout(config.provider.request_timeout())
            .cache_config(CacheConfig::from(&config.cache))
            .cost_model(config.cost_model());

        if let Some(key) = config.provider.api_key() {
            builder = builder.openai(key);
        }
        for (name, overrides) in &config.operations {
            builder = builder.operation(name.clone(), overrides.clone());
        }
        if let Some(path) = &config.usage.path {
            builder = builder.usage_store(JsonlUsageStore::new(path.clone()));
        }
        builder
    }

    /// Use a custom completion provider.
    pub fn provider(self, provider: impl CompletionProvider + 'static) -> Self {
        self.provider_arc(Arc::new(provider))
    }

    /// Use a shared completion provider.
    pub fn provider_arc(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Configure the OpenAI-compatible HTTP provider.
    pub fn openai(mut self, api_key: impl Into<String>) -> Self {
        self.openai_key = Some(api_key.into());
        self
    }

    /// Base URL for the OpenAI-compatible provider.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Master switch. A disabled gateway answers every call with `None`.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Register or replace a prompt template.
    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.templates.register(template);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Use a custom cache backend instead of the one chosen by the eviction policy.
    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn cost_model(mut self, model: CostModel) -> Self {
        self.cost_model = model;
        self
    }

    /// Where usage records go. Defaults to an in-memory store.
    pub fn usage_store(self, store: impl UsageStore + 'static) -> Self {
        self.usage_store_arc(Arc::new(store))
    }

    pub fn usage_store_arc(mut self, store: Arc<dyn UsageStore>) -> Self {
        self.usage_store = Some(store);
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    pub fn default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = temperature;
        self
    }

    /// Override settings for one operation.
    pub fn operation(mut self, name: impl Into<String>, overrides: OperationConfig) -> Self {
        self.operations.insert(name.into(), overrides);
        self
    }

    /// Per-call provider timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the gateway.
    ///
    /// A builder without a provider or API key still succeeds: the
    /// resulting gateway reports `is_configured() == false` and answers
    /// every call with `None`.
    pub fn build(self) -> Result<Gateway> {
        if self.timeout.is_zero() {
            return Err(SluiceError::Configuration(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.cache_config.max_entries == 0 {
            return Err(SluiceError::Configuration(
                "cache max_entries must be greater than zero".to_string(),
            ));
        }

        let provider = match (self.provider, self.openai_key) {
            (Some(provider), _) => Some(provider),
            (None, Some(key)) => {
                let base_url = self
                    .base_url
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
                let provider = OpenAiCompatibleProvider::with_timeout(key, base_url, self.timeout)?;
                Some(Arc::new(provider) as Arc<dyn CompletionProvider>)
            }
            (None, None) => None,
        };

        if provider.is_none() {
            warn!("no provider API key configured; gateway calls will return None");
        } else if !self.enabled {
            info!("gateway disabled by configuration");
        }

        let cache = self
            .cache_backend
            .unwrap_or_else(|| self.cache_config.build_backend());
        let store = self
            .usage_store
            .unwrap_or_else(|| Arc::new(MemoryUsageStore::new()));

        Ok(Gateway {
            provider,
            enabled: self.enabled,
            templates: self.templates,
            cache,
            cache_config: self.cache_config,
            cost_model: self.cost_model,
            tracker: Arc::new(UsageTracker::new(store)),
            default_model: self.default_model,
            default_max_tokens: self.default_max_tokens,
            default_temperature: self.default_temperature,
            operations: self.operations,
            request_timeout: self.timeout,
        })
    }
}

impl Default for SluiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
