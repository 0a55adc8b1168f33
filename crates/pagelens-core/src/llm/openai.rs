//! OpenAI-compatible provider using the Chat Completions API.
//!
//! Serves both OpenAI itself and Volcano Engine Ark, which speaks the same
//! protocol behind a different base URL. The image goes in as a data URL in
//! the user message content array.

use super::provider::{
    matches_any, status_error, transport_error, AnalysisRequest, ImageInput, Overrides,
    ProviderSettings, VisionProvider,
};
use crate::error::AnalysisError;
use crate::types::{ModelInfo, ModelListing};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What differs between OpenAI-compatible backends.
#[derive(Debug, Clone, Copy)]
pub struct Flavor {
    pub id: &'static str,
    pub name: &'static str,
    pub default_base_url: &'static str,
    /// `None` means the model must come from config or an override.
    pub default_model: Option<&'static str>,
    pub vision_keywords: &'static [&'static str],
}

pub const OPENAI: Flavor = Flavor {
    id: "openai",
    name: "OpenAI",
    default_base_url: "https://api.openai.com/v1",
    default_model: Some("gpt-4-vision-preview"),
    vision_keywords: &["vision", "gpt-4-turbo", "gpt-4o"],
};

pub const VOLCANO: Flavor = Flavor {
    id: "volcano",
    name: "Volcano Engine",
    default_base_url: "https://ark.cn-beijing.volces.com/api/v3",
    default_model: None,
    vision_keywords: &["vision", "vl", "doubao"],
};

const MAX_TOKENS: u32 = 1024;

/// OpenAI-compatible provider.
pub struct OpenAiCompatProvider {
    flavor: Flavor,
    settings: ProviderSettings,
    client: reqwest::Client,
    timeout: Duration,
    list_timeout: Duration,
}

impl OpenAiCompatProvider {
    pub fn new(
        flavor: Flavor,
        settings: ProviderSettings,
        timeout: Duration,
        list_timeout: Duration,
    ) -> Self {
        Self {
            flavor,
            settings,
            client: reqwest::Client::new(),
            timeout,
            list_timeout,
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ChatContent>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<RemoteModel>,
}

#[derive(Deserialize)]
struct RemoteModel {
    id: String,
    owned_by: Option<String>,
}

impl OpenAiCompatProvider {
    fn parse_chat_response(&self, resp: ChatResponse) -> Result<String, AnalysisError> {
        let Some(choice) = resp.choices.into_iter().next() else {
            return Err(self.malformed());
        };
        let text = choice
            .message
            .and_then(|m| m.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        match text {
            Some(text) => Ok(text),
            None if choice.finish_reason.as_deref() == Some("content_filter") => Err(
                AnalysisError::ContentBlocked("finish reason content_filter".to_string()),
            ),
            None => Err(self.malformed()),
        }
    }

    fn malformed(&self) -> AnalysisError {
        AnalysisError::MalformedResponse {
            provider: self.flavor.name.to_string(),
            detail: "empty or malformed response".to_string(),
        }
    }
}

#[async_trait]
impl VisionProvider for OpenAiCompatProvider {
    fn id(&self) -> &str {
        self.flavor.id
    }

    fn display_name(&self) -> &str {
        self.flavor.name
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn analyze(
        &self,
        image: &ImageInput,
        request: &AnalysisRequest,
    ) -> Result<String, AnalysisError> {
        let name = self.flavor.name;
        let resolved = self
            .settings
            .resolve(request.overrides(), true)
            .ok_or_else(|| AnalysisError::missing_api_key(name))?;
        let model = resolved
            .model
            .clone()
            .or_else(|| self.flavor.default_model.map(str::to_string))
            .ok_or_else(|| AnalysisError::Configuration {
                provider: name.to_string(),
                message: "model not configured.".to_string(),
            })?;

        let mut parts = vec![ChatContent::ImageUrl {
            image_url: ImageUrl {
                url: image.data_url(),
            },
        }];
        if let Some(prompt) = request.user_prompt() {
            parts.push(ChatContent::Text {
                text: prompt.to_string(),
            });
        }

        let body = ChatRequest {
            model,
            max_tokens: MAX_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(request.system_prompt().to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(parts),
                },
            ],
        };

        tracing::debug!(provider = self.flavor.id, model = %body.model, "Sending chat completion request");

        let resp = self
            .client
            .post(format!("{}/chat/completions", resolved.base_url))
            .bearer_auth(&resolved.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(name, self.timeout, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(name, status, &text));
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| {
            tracing::debug!("Failed to parse {name} response: {e}");
            self.malformed()
        })?;

        self.parse_chat_response(chat_resp)
    }

    async fn list_models(&self, overrides: &Overrides) -> ModelListing {
        let name = self.flavor.name;
        let Some(resolved) = self.settings.resolve(overrides, true) else {
            return ModelListing::error(format!("{name} API key not configured."));
        };

        let resp = match self
            .client
            .get(format!("{}/models", resolved.base_url))
            .bearer_auth(&resolved.api_key)
            .timeout(self.list_timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return ModelListing::error(format!(
                    "Failed to list {name} models: {}",
                    e.without_url()
                ))
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return ModelListing::error(format!(
                "Failed to list {name} models: {}",
                status_error(name, status, &text)
            ));
        }

        let listing: ModelsResponse = match resp.json().await {
            Ok(listing) => listing,
            Err(e) => {
                return ModelListing::error(format!(
                    "Failed to list {name} models: malformed response ({e})"
                ))
            }
        };

        let models = listing
            .data
            .into_iter()
            .map(|m| ModelInfo {
                is_vision: matches_any(&[&m.id], self.flavor.vision_keywords),
                display_name: m.id.clone(),
                description: m.owned_by.map(|owner| format!("Owned by {owner}")),
                id: m.id,
            })
            .collect();

        ModelListing::sorted(models)
    }
}
