//! Google Gemini provider using the `generateContent` REST API.
//!
//! The image travels as `inlineData` in the user turn, the system prompt as
//! `systemInstruction`. The API key is sent per request in the
//! `x-goog-api-key` header; request URLs never contain it.

use super::provider::{
    matches_any, status_error, transport_error, AnalysisRequest, ImageInput, Overrides,
    ProviderSettings, VisionProvider,
};
use crate::error::AnalysisError;
use crate::types::{ModelInfo, ModelListing};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

const VISION_KEYWORDS: &[&str] = &[
    "vision",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-ultra",
    "multimodal",
];

const NAME: &str = "Gemini";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider.
pub struct GeminiProvider {
    settings: ProviderSettings,
    client: reqwest::Client,
    timeout: Duration,
    list_timeout: Duration,
}

impl GeminiProvider {
    pub fn new(settings: ProviderSettings, timeout: Duration, list_timeout: Duration) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
            timeout,
            list_timeout,
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

// --- Response types ---

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct SafetyRating {
    #[serde(default)]
    category: String,
    #[serde(default)]
    probability: String,
}

#[derive(Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<GeminiModel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModel {
    name: String,
    display_name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

/// Strip the `models/` resource prefix the listing API reports.
fn bare_model_name(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// Extract the analysis text, or explain why there is none.
fn parse_generate_response(resp: GenerateResponse) -> Result<String, AnalysisError> {
    let first_text = resp
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|content| content.parts.first())
        .and_then(|part| non_blank(part.text.as_deref()));
    if let Some(text) = first_text {
        return Ok(text.to_string());
    }

    if let Some(reason) = resp
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(AnalysisError::ContentBlocked(reason.to_string()));
    }

    for candidate in &resp.candidates {
        let Some(reason) = candidate.finish_reason.as_deref() else {
            continue;
        };
        if reason == "STOP" || reason == "FINISH_REASON_UNSPECIFIED" {
            continue;
        }
        let mut message = format!("generation stopped. Finish reason: {reason}.");
        if !candidate.safety_ratings.is_empty() {
            let ratings: Vec<String> = candidate
                .safety_ratings
                .iter()
                .map(|r| format!("{}={}", r.category, r.probability))
                .collect();
            message.push_str(&format!(" Safety ratings: {}", ratings.join(", ")));
        }
        return Err(AnalysisError::ContentBlocked(message));
    }

    if let Some(text) = non_blank(resp.text.as_deref()) {
        return Ok(text.to_string());
    }

    Err(AnalysisError::MalformedResponse {
        provider: NAME.to_string(),
        detail: "empty or unexpected response".to_string(),
    })
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    fn display_name(&self) -> &str {
        NAME
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn analyze(
        &self,
        image: &ImageInput,
        request: &AnalysisRequest,
    ) -> Result<String, AnalysisError> {
        let resolved = self
            .settings
            .resolve(request.overrides(), false)
            .ok_or_else(|| AnalysisError::missing_api_key(NAME))?;
        let model = resolved.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let model = bare_model_name(model);

        let mut parts = Vec::with_capacity(2);
        if let Some(prompt) = request.user_prompt() {
            parts.push(RequestPart::Text {
                text: prompt.to_string(),
            });
        }
        parts.push(RequestPart::Inline {
            inline_data: InlineData {
                mime_type: image.media_type.clone(),
                data: image.data.clone(),
            },
        });

        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![RequestPart::Text {
                    text: request.system_prompt().to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts,
            }],
        };

        tracing::debug!(model, "Sending Gemini generateContent request");

        let resp = self
            .client
            .post(format!(
                "{}/models/{model}:generateContent",
                resolved.base_url
            ))
            .header(API_KEY_HEADER, resolved.api_key.as_str())
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(NAME, self.timeout, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(NAME, status, &text));
        }

        let parsed: GenerateResponse =
            resp.json().await.map_err(|e| AnalysisError::MalformedResponse {
                provider: NAME.to_string(),
                detail: format!("not valid JSON ({e})"),
            })?;

        parse_generate_response(parsed)
    }

    async fn list_models(&self, overrides: &Overrides) -> ModelListing {
        let Some(resolved) = self.settings.resolve(overrides, false) else {
            return ModelListing::error(format!("{NAME} API key not configured."));
        };

        let resp = match self
            .client
            .get(format!("{}/models", resolved.base_url))
            .header(API_KEY_HEADER, resolved.api_key.as_str())
            .timeout(self.list_timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return ModelListing::error(format!(
                    "Failed to list {NAME} models: {}",
                    e.without_url()
                ))
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return ModelListing::error(format!(
                "Failed to list {NAME} models: {}",
                status_error(NAME, status, &text)
            ));
        }

        let listing: ListModelsResponse = match resp.json().await {
            Ok(listing) => listing,
            Err(e) => {
                return ModelListing::error(format!(
                    "Failed to list {NAME} models: malformed response ({e})"
                ))
            }
        };

        let models = listing
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|m| {
                let id = bare_model_name(&m.name).to_string();
                let display_name = m.display_name.unwrap_or_else(|| id.clone());
                let is_vision = matches_any(&[&id, &display_name], VISION_KEYWORDS);
                ModelInfo {
                    id,
                    display_name,
                    description: m.description.filter(|d| !d.trim().is_empty()),
                    is_vision,
                }
            })
            .collect();

        ModelListing::sorted(models)
    }
}
