//! Error types for pagelens.
//!
//! Errors are split by boundary: batch-level dispatch failures abort a whole
//! request, while per-page analysis failures are folded into the page's
//! [`AnalysisResult`](crate::types::AnalysisResult) and never escape the
//! dispatcher.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ErrorKind;

/// Top-level error type for pagelens operations.
#[derive(Error, Debug)]
pub enum PagelensError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Batch-level dispatch errors
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors that reject a batch before any page is analyzed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Provider identifier is not one pagelens knows about
    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),

    /// Provider is known but was not loaded into the registry
    #[error("LLM provider '{0}' is not available (client not loaded)")]
    ProviderUnavailable(String),

    /// Nothing to analyze
    #[error("No page images to analyze")]
    EmptyBatch,
}

/// Failure analyzing a single page image.
///
/// Each variant maps onto an [`ErrorKind`] tag so callers can tell a model
/// refusal apart from a failed call.
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    /// No credential (or no model) resolved from overrides and configuration
    #[error("{provider} {message}")]
    Configuration { provider: String, message: String },

    /// Image file does not exist
    #[error("Image file not found at {}", .0.display())]
    ImageNotFound(PathBuf),

    /// Image bytes could not be read or identified
    #[error("Cannot identify image file {} (corrupt or unsupported format): {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// Provider call exceeded its deadline
    #[error("{provider} API call timed out after {} seconds", *timeout_ms as f64 / 1000.0)]
    Timeout { provider: String, timeout_ms: u64 },

    /// Provider returned an error (auth, quota, server)
    #[error("{message}")]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    /// Request never got a response: connection refused, DNS, TLS
    #[error("{provider} request failed: {message}")]
    Transport { provider: String, message: String },

    /// Provider refused to produce content (safety block, non-stop finish)
    #[error("Content generation blocked - {0}")]
    ContentBlocked(String),

    /// Provider answered but the payload carried no usable text
    #[error("{provider} API response was {detail}")]
    MalformedResponse { provider: String, detail: String },

    /// Batch was cancelled before this page was sent
    #[error("Analysis cancelled before the request was sent")]
    Cancelled,

    /// Anything else
    #[error("An unexpected error occurred: {0}")]
    Unknown(String),
}

impl AnalysisError {
    /// Shorthand for a missing-credential error.
    pub fn missing_api_key(provider: &str) -> Self {
        Self::Configuration {
            provider: provider.to_string(),
            message: "API key not configured.".to_string(),
        }
    }

    /// Classification tag carried into the page result.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::ImageNotFound(_) => ErrorKind::ImageNotFound,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Api { .. } | Self::Transport { .. } => ErrorKind::Api,
            Self::ContentBlocked(_) => ErrorKind::ContentBlocked,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

/// Convenience type alias for pagelens results.
pub type Result<T> = std::result::Result<T, PagelensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_message() {
        let err = AnalysisError::missing_api_key("Gemini");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "Gemini API key not configured.");
    }

    #[test]
    fn test_timeout_embeds_seconds() {
        let err = AnalysisError::Timeout {
            provider: "OpenAI".to_string(),
            timeout_ms: 60_000,
        };
        assert!(err.to_string().contains("60 seconds"));
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_sub_second_timeout_is_not_rounded_down() {
        let timeout = |ms| AnalysisError::Timeout {
            provider: "Gemini".to_string(),
            timeout_ms: ms,
        };
        assert!(timeout(500).to_string().ends_with("after 0.5 seconds"));
        assert!(timeout(1500).to_string().ends_with("after 1.5 seconds"));
    }

    #[test]
    fn test_transport_failure_reports_as_api_kind() {
        let err = AnalysisError::Transport {
            provider: "OpenAI".to_string(),
            message: "error sending request".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.to_string(), "OpenAI request failed: error sending request");
    }

    #[test]
    fn test_content_blocked_kind_is_distinct_from_api() {
        let blocked = AnalysisError::ContentBlocked("SAFETY".to_string());
        let api = AnalysisError::Api {
            message: "boom".to_string(),
            status_code: Some(500),
        };
        assert_ne!(blocked.kind(), api.kind());
    }
}
