//! Provider registry: identifier to loaded client.
//!
//! Built once from configuration. A provider is loaded whenever its section
//! is enabled, even without a baseline key, since callers may supply one per
//! request.

use super::gemini::{self, GeminiProvider};
use super::openai::{self, OpenAiCompatProvider};
use super::provider::{ProviderSettings, VisionProvider};
use crate::config::{Config, ProviderConfig};
use crate::error::DispatchError;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Identifiers pagelens knows how to talk to.
pub const KNOWN_PROVIDERS: &[&str] = &["gemini", "openai", "volcano"];

/// Loaded providers keyed by identifier.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn VisionProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every enabled provider from configuration.
    pub fn from_config(config: &Config) -> Self {
        let timeout = Duration::from_millis(config.dispatch.timeout_ms);
        let list_timeout = Duration::from_millis(config.dispatch.list_timeout_ms);
        let mut registry = Self::new();

        let gemini_cfg = &config.providers.gemini;
        if gemini_cfg.enabled {
            registry.register(Arc::new(GeminiProvider::new(
                settings_from(gemini_cfg, gemini::DEFAULT_BASE_URL),
                timeout,
                list_timeout,
            )));
        }

        for (flavor, cfg) in [
            (openai::OPENAI, &config.providers.openai),
            (openai::VOLCANO, &config.providers.volcano),
        ] {
            if cfg.enabled {
                registry.register(Arc::new(OpenAiCompatProvider::new(
                    flavor,
                    settings_from(cfg, flavor.default_base_url),
                    timeout,
                    list_timeout,
                )));
            }
        }

        for provider in registry.providers.values() {
            if !provider.settings().has_api_key() {
                tracing::warn!(
                    provider = provider.id(),
                    "No baseline API key; requests must supply one"
                );
            }
        }
        tracing::debug!(providers = ?registry.ids(), "Provider registry loaded");

        registry
    }

    /// Add or replace a provider under its own identifier.
    pub fn register(&mut self, provider: Arc<dyn VisionProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    /// Look up a provider, distinguishing unknown identifiers from unloaded ones.
    pub fn get(&self, id: &str) -> Result<Arc<dyn VisionProvider>, DispatchError> {
        let id = id.trim().to_lowercase();
        if let Some(provider) = self.providers.get(&id) {
            return Ok(provider.clone());
        }
        if KNOWN_PROVIDERS.contains(&id.as_str()) {
            Err(DispatchError::ProviderUnavailable(id))
        } else {
            Err(DispatchError::UnsupportedProvider(id))
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

fn settings_from(cfg: &ProviderConfig, default_base_url: &str) -> ProviderSettings {
    ProviderSettings::new(
        cfg.resolved_api_key(),
        cfg.resolved_model(),
        cfg.resolved_base_url()
            .unwrap_or_else(|| default_base_url.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_keys() -> Config {
        let mut config = Config::default();
        config.providers.gemini.api_key = "g-key".to_string();
        config.providers.openai.api_key = "o-key".to_string();
        config.providers.volcano.api_key = "v-key".to_string();
        config
    }

    #[test]
    fn test_from_config_loads_enabled_providers() {
        let registry = ProviderRegistry::from_config(&config_with_keys());
        assert_eq!(registry.ids(), vec!["gemini", "openai", "volcano"]);
        assert!(registry.get("Gemini").is_ok());
    }

    #[test]
    fn test_unsupported_vs_unavailable() {
        let mut config = config_with_keys();
        config.providers.volcano.enabled = false;
        let registry = ProviderRegistry::from_config(&config);

        assert_eq!(
            registry.get("anthropic").err(),
            Some(DispatchError::UnsupportedProvider("anthropic".to_string()))
        );
        assert_eq!(
            registry.get("volcano").err(),
            Some(DispatchError::ProviderUnavailable("volcano".to_string()))
        );
    }

    #[test]
    fn test_default_base_url_applies_when_unset() {
        let mut config = config_with_keys();
        config.providers.openai.base_url = String::new();
        let registry = ProviderRegistry::from_config(&config);
        let provider = registry.get("openai").unwrap();
        assert_eq!(provider.settings().base_url(), openai::OPENAI.default_base_url);
    }

    #[test]
    fn test_provider_loaded_without_key() {
        let mut config = Config::default();
        config.providers.gemini.api_key = String::new();
        let registry = ProviderRegistry::from_config(&config);
        let gemini = registry.get("gemini").unwrap();
        assert!(!gemini.settings().has_api_key());
    }
}
