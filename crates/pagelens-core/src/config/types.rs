//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};

/// Prompt sent as the system instruction when nothing overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Analyze this image and describe its content.";

/// Resolve `${ENV_VAR}` references in config strings.
///
/// Plain strings pass through, empty strings and unset variables resolve to `None`.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
    } else if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Provider used when the caller does not pick one
    pub default_provider: String,

    /// Default system prompt for every page
    pub system_prompt: String,

    /// Optional user-turn prompt sent alongside each page (empty = none)
    pub user_prompt: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_provider: "gemini".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt: String::new(),
        }
    }
}

/// Batch dispatch settings: concurrency, deadlines, retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum concurrent provider calls per batch
    pub parallel: usize,

    /// Per-page analysis timeout in milliseconds
    pub timeout_ms: u64,

    /// Model listing timeout in milliseconds
    pub list_timeout_ms: u64,

    /// Retries for transient failures (timeouts, 429, 5xx). 0 disables retry.
    pub retry_attempts: u32,

    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            parallel: 4,
            timeout_ms: 60_000,
            list_timeout_ms: 30_000,
            retry_attempts: 0,
            retry_delay_ms: 1000,
        }
    }
}

/// Token-bucket settings gating outbound provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Gate provider calls through the limiter
    pub enabled: bool,

    /// Refill rate in calls per second
    pub tokens_per_second: f64,

    /// Burst capacity
    pub max_tokens: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tokens_per_second: 1.0,
            max_tokens: 5.0,
        }
    }
}

/// Page image discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// File extensions treated as page images
    pub supported_formats: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            supported_formats: ["png", "jpg", "jpeg", "webp", "gif", "bmp", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format ("json", "jsonl" or "markdown")
    pub format: String,

    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            pretty: false,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Per-provider baseline: credential, model, endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Register this provider at startup
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    /// API key (supports ${ENV_VAR} syntax)
    #[serde(default)]
    pub api_key: String,

    /// Default model name (supports ${ENV_VAR} syntax)
    #[serde(default)]
    pub model: String,

    /// API base URL (supports ${ENV_VAR} syntax; empty = provider default)
    #[serde(default)]
    pub base_url: String,
}

fn enabled_by_default() -> bool {
    true
}

impl ProviderConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_env_var(&self.api_key)
    }

    pub fn resolved_model(&self) -> Option<String> {
        resolve_env_var(&self.model)
    }

    pub fn resolved_base_url(&self) -> Option<String> {
        resolve_env_var(&self.base_url)
    }
}

/// Provider baselines keyed by provider identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Google Gemini (native multimodal API)
    pub gemini: ProviderConfig,

    /// OpenAI Chat Completions
    pub openai: ProviderConfig,

    /// Volcano Engine Ark (OpenAI-compatible)
    pub volcano: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            gemini: ProviderConfig {
                enabled: true,
                api_key: "${GEMINI_API_KEY}".to_string(),
                model: "gemini-1.5-flash-latest".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            },
            openai: ProviderConfig {
                enabled: true,
                api_key: "${OPENAI_API_KEY}".to_string(),
                model: "gpt-4-vision-preview".to_string(),
                base_url: "${OPENAI_BASE_URL}".to_string(),
            },
            volcano: ProviderConfig {
                enabled: true,
                api_key: "${VOLCANO_API_KEY}".to_string(),
                model: "${VOLCANO_MODEL_NAME}".to_string(),
                base_url: "https://ark.cn-beijing.volces.com/api/v3".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_env_var() {
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        assert_eq!(resolve_env_var(""), None);
        assert_eq!(resolve_env_var("   "), None);
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_PAGELENS_123}"), None);
    }

    #[test]
    fn test_provider_defaults() {
        let providers = ProvidersConfig::default();
        assert_eq!(
            providers.gemini.resolved_model().as_deref(),
            Some("gemini-1.5-flash-latest")
        );
        assert_eq!(
            providers.volcano.resolved_base_url().as_deref(),
            Some("https://ark.cn-beijing.volces.com/api/v3")
        );
    }

    #[test]
    fn test_partial_provider_section_keeps_enabled() {
        let cfg: ProviderConfig = toml::from_str(r#"api_key = "k""#).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.resolved_api_key().as_deref(), Some("k"));
        assert_eq!(cfg.resolved_model(), None);
    }
}
