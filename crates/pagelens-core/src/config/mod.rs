//! Configuration management for pagelens.
//!
//! Configuration is loaded from the platform config directory
//! (`pagelens/config.toml`) with sensible defaults, then environment
//! variables are layered on top so `.env`-style deployments keep working.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for pagelens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Batch dispatch settings
    pub dispatch: DispatchConfig,

    /// Outbound rate limiting
    pub rate_limit: RateLimitConfig,

    /// Page image discovery
    pub discovery: DiscoveryConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// LLM provider baselines
    pub providers: ProvidersConfig,
}

impl Config {
    /// Load configuration from the default location, then apply environment overrides.
    ///
    /// Returns default configuration (plus environment) if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&Self::default_path())
    }

    /// Load `path` if it exists (defaults otherwise), then apply environment overrides.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            tracing::debug!("No config file at {:?}, using defaults", path);
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path (no environment overrides).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.pagelens.pagelens/config.toml
    /// - Linux: ~/.config/pagelens/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\pagelens\config\config.toml
    ///
    /// Falls back to ~/.pagelens/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "pagelens", "pagelens")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let expanded = shellexpand::tilde("~/.pagelens/config.toml");
                PathBuf::from(expanded.into_owned())
            })
    }

    /// Layer process environment on top of file values.
    ///
    /// `lookup` is injected so tests don't have to mutate the real environment.
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(prompt) = get("DEFAULT_SYSTEM_PROMPT") {
            self.general.system_prompt = prompt;
        }
        if let Some(provider) = get("LLM_PROVIDER") {
            self.general.default_provider = provider.to_lowercase();
        }

        let provider_vars = [
            (&mut self.providers.gemini, "GEMINI_API_KEY", "GEMINI_VISION_MODEL", "GEMINI_BASE_URL"),
            (&mut self.providers.openai, "OPENAI_API_KEY", "OPENAI_MODEL_NAME", "OPENAI_BASE_URL"),
            (&mut self.providers.volcano, "VOLCANO_API_KEY", "VOLCANO_MODEL_NAME", "VOLCANO_BASE_URL"),
        ];
        for (provider, key_var, model_var, url_var) in provider_vars {
            if let Some(key) = get(key_var) {
                provider.api_key = key;
            }
            if let Some(model) = get(model_var) {
                provider.model = model;
            }
            if let Some(url) = get(url_var) {
                provider.base_url = url;
            }
        }

        match get("API_CALLS_PER_SECOND").map(|v| v.parse::<f64>()) {
            Some(Ok(rate)) => self.rate_limit.tokens_per_second = rate,
            Some(Err(e)) => tracing::warn!("Ignoring API_CALLS_PER_SECOND: {e}"),
            None => {}
        }
        match get("API_MAX_TOKENS").map(|v| v.parse::<f64>()) {
            Some(Ok(burst)) => self.rate_limit.max_tokens = burst,
            Some(Err(e)) => tracing::warn!("Ignoring API_MAX_TOKENS: {e}"),
            None => {}
        }
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
