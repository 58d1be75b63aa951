//! Provider router: selects the LLM provider named in configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use dekomposit_config::AppConfig;
use dekomposit_core::error::ProviderError;
use dekomposit_core::provider::Provider;
use tracing::{info, warn};
use crate::openai_compat::OpenAiCompatProvider;

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(&name.trim().to_lowercase()).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build the router from configuration.
///
/// Every entry of `llm.endpoints` becomes an OpenAI-compatible provider.
/// The API key resolved from configuration is only attached to the selected
/// provider; the others are registered keyless (useful for local servers).
pub fn build_from_config(config: &AppConfig) -> Result<ProviderRouter, ProviderError> {
    let selected = config.llm.provider.trim().to_lowercase();
    let mut router = ProviderRouter::new(selected.clone());
    let timeout = Duration::from_secs(config.llm.request_timeout_secs);

    let api_key = config.llm.resolve_api_key();
    if api_key.is_none() {
        warn!(
            provider = %selected,
            env = %config.llm.api_key_env,
            "No API key found, requests will be sent unauthenticated"
        );
    }

    for (name, base_url) in &config.llm.endpoints {
        let key = if *name == selected {
            api_key.clone().unwrap_or_default()
        } else {
            String::new()
        };
        let provider = OpenAiCompatProvider::new(name.clone(), base_url.clone(), key, timeout)?;
        router.register(name.clone(), Arc::new(provider));
    }

    if router.default_provider().is_none() {
        return Err(ProviderError::NotConfigured(format!(
            "no endpoint configured for provider '{selected}'"
        )));
    }

    info!(provider = %selected, model = %config.llm.model, "LLM provider ready");
    Ok(router)
}

/// Build only the configured default provider.
pub fn default_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let router = build_from_config(config)?;
    router
        .default_provider()
        .ok_or_else(|| ProviderError::NotConfigured(config.llm.provider.clone()))
}
