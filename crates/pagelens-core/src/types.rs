//! Core data types exchanged between the dispatcher and its callers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::AnalysisError;

/// Handle to one page image within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    /// Position in the submitted batch; results are reassembled by this
    pub index: usize,

    /// Path to the page image on disk
    pub path: PathBuf,
}

impl ImageRef {
    pub fn new(index: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            path: path.into(),
        }
    }
}

/// Classification of a per-page failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    ImageNotFound,
    Decode,
    Timeout,
    Api,
    ContentBlocked,
    MalformedResponse,
    Cancelled,
    Unknown,
}

/// What came back for a page: analysis text or an error description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Analysis { text: String },
    Error { kind: ErrorKind, message: String },
}

/// The result of analyzing one page image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub image: ImageRef,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl AnalysisResult {
    pub fn success(image: ImageRef, text: impl Into<String>) -> Self {
        Self {
            image,
            outcome: Outcome::Analysis { text: text.into() },
        }
    }

    pub fn failure(image: ImageRef, error: &AnalysisError) -> Self {
        Self {
            image,
            outcome: Outcome::Error {
                kind: error.kind(),
                message: format!("Error: {error}"),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Analysis { .. })
    }

    /// Text to display or export: the analysis, or the error description.
    pub fn display_text(&self) -> &str {
        match &self.outcome {
            Outcome::Analysis { text } => text,
            Outcome::Error { message, .. } => message,
        }
    }
}

/// All page results for one document, in page order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResults {
    pub name: String,
    pub results: Vec<AnalysisResult>,
}

impl DocumentResults {
    pub fn new(name: impl Into<String>, results: Vec<AnalysisResult>) -> Self {
        Self {
            name: name.into(),
            results,
        }
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}

/// One model a provider credential can access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Keyword heuristic on the model id/name. Approximate: provider model
    /// catalogs drift and this is not authoritative capability detection.
    pub is_vision: bool,
}

/// Model enumeration outcome, shaped as `{"models": [...]}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelListing {
    Models { models: Vec<ModelInfo> },
    Error { error: String },
}

impl ModelListing {
    /// Build a listing with vision models first, then by display name.
    pub fn sorted(mut models: Vec<ModelInfo>) -> Self {
        models.sort_by(|a, b| {
            (!a.is_vision, a.display_name.to_lowercase())
                .cmp(&(!b.is_vision, b.display_name.to_lowercase()))
        });
        Self::Models { models }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, is_vision: bool) -> ModelInfo {
        ModelInfo {
            id: id.to_string(),
            display_name: id.to_string(),
            description: None,
            is_vision,
        }
    }

    #[test]
    fn test_result_serializes_flat() {
        let result = AnalysisResult::success(ImageRef::new(0, "page_1.png"), "hello");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "analysis");
        assert_eq!(json["text"], "hello");
        assert_eq!(json["image"]["index"], 0);
    }

    #[test]
    fn test_failure_carries_kind_and_prefix() {
        let err = AnalysisError::Cancelled;
        let result = AnalysisResult::failure(ImageRef::new(3, "p.png"), &err);
        assert!(!result.is_success());
        assert!(result.display_text().starts_with("Error: "));
        match result.outcome {
            Outcome::Error { kind, .. } => assert_eq!(kind, ErrorKind::Cancelled),
            Outcome::Analysis { .. } => panic!("expected error outcome"),
        }
    }

    #[test]
    fn test_listing_sorts_vision_first() {
        let listing = ModelListing::sorted(vec![
            model("b-text", false),
            model("z-vision", true),
            model("A-text", false),
        ]);
        match listing {
            ModelListing::Models { models } => {
                let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
                assert_eq!(ids, vec!["z-vision", "A-text", "b-text"]);
            }
            ModelListing::Error { .. } => panic!("expected models"),
        }
    }

    #[test]
    fn test_listing_error_shape() {
        let json = serde_json::to_string(&ModelListing::error("nope")).unwrap();
        assert_eq!(json, r#"{"error":"nope"}"#);
    }
}
