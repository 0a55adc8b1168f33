//! Vision provider trait, request types, and per-call settings resolution.
//!
//! Every provider call derives its own [`ResolvedSettings`] from the
//! provider's baseline plus the request's [`Overrides`]. Nothing global is
//! reconfigured, so concurrent calls with different credentials cannot
//! observe each other.

use crate::error::AnalysisError;
use crate::types::ModelListing;
use async_trait::async_trait;
use base64::Engine;
use image::ImageFormat;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Base64-encoded page image ready to send to a provider.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Encode raw bytes, sniffing the format from the content.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self, AnalysisError> {
        if bytes.is_empty() {
            return Err(AnalysisError::Decode {
                path: path.to_path_buf(),
                message: "file is empty".to_string(),
            });
        }
        let format = image::guess_format(bytes).map_err(|e| AnalysisError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let media_type = match format {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            other => {
                return Err(AnalysisError::Decode {
                    path: path.to_path_buf(),
                    message: format!("unsupported image format {other:?}"),
                })
            }
        };

        Ok(Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        })
    }

    /// Read and encode a page image from disk.
    pub async fn load(path: &Path) -> Result<Self, AnalysisError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnalysisError::ImageNotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(AnalysisError::Decode {
                    path: path.to_path_buf(),
                    message: format!("failed to read image: {e}"),
                });
            }
        };
        Self::from_bytes(&bytes, path)
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Per-request values that take precedence over configured baselines.
///
/// Empty or whitespace-only values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
}

impl Overrides {
    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }

    pub fn model(&self) -> Option<&str> {
        non_empty(self.model.as_deref())
    }

    pub fn base_url(&self) -> Option<&str> {
        non_empty(self.base_url.as_deref())
    }

    pub fn system_prompt(&self) -> Option<&str> {
        non_empty(self.system_prompt.as_deref())
    }

    pub fn user_prompt(&self) -> Option<&str> {
        non_empty(self.user_prompt.as_deref())
    }
}

/// Trimmed value, or `None` when blank.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// The shared part of a batch: which provider, which prompts, which overrides.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    provider: String,
    default_system_prompt: String,
    overrides: Overrides,
}

impl AnalysisRequest {
    pub fn new(provider: impl Into<String>, default_system_prompt: impl Into<String>) -> Self {
        Self {
            provider: provider.into().trim().to_lowercase(),
            default_system_prompt: default_system_prompt.into(),
            overrides: Overrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// System prompt after applying the override.
    pub fn system_prompt(&self) -> &str {
        self.overrides
            .system_prompt()
            .unwrap_or(self.default_system_prompt.trim())
    }

    pub fn user_prompt(&self) -> Option<&str> {
        self.overrides.user_prompt()
    }
}

/// Baseline credential, model, and endpoint for one provider.
#[derive(Debug)]
pub struct ProviderSettings {
    api_key: Option<String>,
    model: Option<String>,
    base_url: String,
    reconfigurations: AtomicU64,
}

/// Settings in effect for a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: String,
}

impl ProviderSettings {
    pub fn new(api_key: Option<String>, model: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.filter(|m| !m.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            reconfigurations: AtomicU64::new(0),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Number of calls that ran with a credential or endpoint differing from the baseline.
    pub fn reconfigurations(&self) -> u64 {
        self.reconfigurations.load(Ordering::Relaxed)
    }

    /// Resolve the settings for one call.
    ///
    /// `honor_base_url` is false for providers without custom endpoints.
    /// Returns `None` when neither the override nor the baseline holds a
    /// credential.
    pub fn resolve(&self, overrides: &Overrides, honor_base_url: bool) -> Option<ResolvedSettings> {
        let api_key = overrides
            .api_key()
            .map(str::to_string)
            .or_else(|| self.api_key.clone())?;
        let base_url = overrides
            .base_url()
            .filter(|_| honor_base_url)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| self.base_url.clone());
        let model = overrides
            .model()
            .map(str::to_string)
            .or_else(|| self.model.clone());

        let key_differs = self.api_key.as_deref() != Some(api_key.as_str());
        if key_differs || base_url != self.base_url {
            self.reconfigurations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Using per-call override settings (baseline left untouched)");
        }

        Some(ResolvedSettings {
            api_key,
            model,
            base_url,
        })
    }
}

/// Trait that all vision providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the registry hands out `Arc<dyn VisionProvider>`).
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Provider identifier (e.g., "gemini", "volcano").
    fn id(&self) -> &str;

    /// Human-readable name used in messages.
    fn display_name(&self) -> &str;

    /// Baseline settings, exposed for diagnostics and tests.
    fn settings(&self) -> &ProviderSettings;

    /// Analyze one page image. Never panics on provider misbehaviour;
    /// every failure comes back as an [`AnalysisError`].
    async fn analyze(
        &self,
        image: &ImageInput,
        request: &AnalysisRequest,
    ) -> Result<String, AnalysisError>;

    /// Enumerate models the effective credential can access.
    ///
    /// Never fails: errors are folded into [`ModelListing::Error`] naming
    /// the provider.
    async fn list_models(&self, overrides: &Overrides) -> ModelListing;

    /// Calls that ran with an override credential or endpoint.
    fn reconfigurations(&self) -> u64 {
        self.settings().reconfigurations()
    }
}

/// Keyword heuristic for "probably accepts images".
///
/// Approximate: the keyword lists drift as providers rename models, so
/// `is_vision` is a hint for display, not a capability check.
pub(crate) fn matches_any(haystacks: &[&str], keywords: &[&str]) -> bool {
    haystacks.iter().any(|h| {
        let h = h.to_lowercase();
        keywords.iter().any(|k| h.contains(k))
    })
}

/// Map a transport-level reqwest failure onto the analysis taxonomy.
///
/// The URL is stripped from the message: it may carry credentials and the
/// text ends up in results, logs and exports.
pub(crate) fn transport_error(provider: &str, timeout: Duration, e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() {
        return AnalysisError::Timeout {
            provider: provider.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        };
    }
    let connection_failed = e.is_connect() || e.is_request();
    let message = describe(e.without_url());
    if connection_failed {
        AnalysisError::Transport {
            provider: provider.to_string(),
            message,
        }
    } else {
        AnalysisError::Api {
            message: format!("{provider} request failed: {message}"),
            status_code: None,
        }
    }
}

/// Error text including the innermost cause ("Connection refused" and the
/// like), which reqwest keeps out of its own `Display`.
fn describe(e: reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = std::error::Error::source(&e);
    let mut root = None;
    while let Some(cause) = source {
        root = Some(cause);
        source = cause.source();
    }
    if let Some(root) = root {
        message.push_str(&format!(" ({root})"));
    }
    message
}

/// Map a non-success HTTP status onto the analysis taxonomy.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: &str) -> AnalysisError {
    let message = match status.as_u16() {
        401 | 403 => format!(
            "{provider} API request failed (HTTP {status}). Check API key and permissions. {body}"
        ),
        _ => format!("{provider} HTTP {status}: {body}"),
    };
    AnalysisError::Api {
        message: message.trim_end().to_string(),
        status_code: Some(status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_image_input_sniffs_png() {
        let input = ImageInput::from_bytes(PNG_MAGIC, Path::new("page_1.jpg")).unwrap();
        assert_eq!(input.media_type, "image/png");
        assert!(input.data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_image_input_rejects_garbage() {
        let err = ImageInput::from_bytes(b"not an image", Path::new("x.png")).unwrap_err();
        assert!(matches!(err, AnalysisError::Decode { .. }));
    }

    #[test]
    fn test_image_input_rejects_empty() {
        let err = ImageInput::from_bytes(&[], Path::new("x.png")).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = ImageInput::load(Path::new("/nonexistent/page_1.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ImageNotFound(_)));
    }

    #[test]
    fn test_blank_overrides_are_absent() {
        let overrides = Overrides {
            api_key: Some("   ".to_string()),
            model: Some("".to_string()),
            system_prompt: Some(" Describe. ".to_string()),
            ..Default::default()
        };
        assert_eq!(overrides.api_key(), None);
        assert_eq!(overrides.model(), None);
        assert_eq!(overrides.system_prompt(), Some("Describe."));
    }

    #[test]
    fn test_request_system_prompt_fallback() {
        let request = AnalysisRequest::new(" Gemini ", "default prompt");
        assert_eq!(request.provider(), "gemini");
        assert_eq!(request.system_prompt(), "default prompt");

        let request = request.with_overrides(Overrides {
            system_prompt: Some("custom".to_string()),
            ..Default::default()
        });
        assert_eq!(request.system_prompt(), "custom");
    }

    #[test]
    fn test_resolve_without_any_key() {
        let settings = ProviderSettings::new(None, Some("m".into()), "https://x");
        assert!(settings.resolve(&Overrides::default(), true).is_none());
        assert_eq!(settings.reconfigurations(), 0);
    }

    #[test]
    fn test_resolve_override_equal_to_baseline_does_not_reconfigure() {
        let settings = ProviderSettings::new(Some("base".into()), None, "https://x/");
        let overrides = Overrides {
            api_key: Some("base".to_string()),
            base_url: Some("https://x".to_string()),
            ..Default::default()
        };
        let resolved = settings.resolve(&overrides, true).unwrap();
        assert_eq!(resolved.api_key, "base");
        assert_eq!(settings.reconfigurations(), 0);
    }

    #[test]
    fn test_resolve_override_key_leaves_baseline_intact() {
        let settings = ProviderSettings::new(Some("base".into()), Some("m1".into()), "https://x");
        let overrides = Overrides {
            api_key: Some("other".to_string()),
            model: Some("m2".to_string()),
            ..Default::default()
        };
        let resolved = settings.resolve(&overrides, true).unwrap();
        assert_eq!(resolved.api_key, "other");
        assert_eq!(resolved.model.as_deref(), Some("m2"));
        assert_eq!(settings.reconfigurations(), 1);

        let baseline = settings.resolve(&Overrides::default(), true).unwrap();
        assert_eq!(baseline.api_key, "base");
        assert_eq!(baseline.model.as_deref(), Some("m1"));
        assert_eq!(settings.reconfigurations(), 1);
    }

    #[test]
    fn test_resolve_ignores_base_url_when_not_honored() {
        let settings = ProviderSettings::new(Some("k".into()), None, "https://native");
        let overrides = Overrides {
            base_url: Some("https://elsewhere".to_string()),
            ..Default::default()
        };
        let resolved = settings.resolve(&overrides, false).unwrap();
        assert_eq!(resolved.base_url, "https://native");
        assert_eq!(settings.reconfigurations(), 0);
    }

    #[test]
    fn test_override_key_without_baseline() {
        let settings = ProviderSettings::new(None, None, "https://x");
        let overrides = Overrides {
            api_key: Some("ui-key".to_string()),
            ..Default::default()
        };
        assert_eq!(settings.resolve(&overrides, true).unwrap().api_key, "ui-key");
    }

    #[test]
    fn test_matches_any_case_insensitive() {
        assert!(matches_any(&["GPT-4o-mini"], &["gpt-4o"]));
        assert!(!matches_any(&["text-embedding-3"], &["vision", "gpt-4o"]));
    }
}
