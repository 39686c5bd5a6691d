//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{CompletionClient, CompletionRequest, LlmError, LlmResult};
use crate::config::LlmSettings;

/// Client for `POST {base_url}/chat/completions` with strict JSON-schema output.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    /// Create a client with an explicit key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> LlmResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Create a client from settings, reading the key from `api_key_env`.
    pub fn from_settings(settings: &LlmSettings) -> LlmResult<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(settings.api_key_env.clone()))?;

        Self::new(
            &settings.base_url,
            api_key,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Wire body for a chat completion with a strict schema.
fn request_body(request: &CompletionRequest) -> serde_json::Value {
    json!({
        "model": request.model,
        "messages": request.messages,
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": request.response_format.name,
                "schema": request.response_format.schema,
                "strict": true
            }
        }
    })
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pull the structured answer out of a chat completion response.
fn extract_content(response: ChatResponse) -> LlmResult<serde_json::Value> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or(LlmError::EmptyResponse)?;

    if let Some(refusal) = message.refusal {
        return Err(LlmError::Refused(refusal));
    }

    let content = message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or(LlmError::EmptyResponse)?;

    serde_json::from_str(&content).map_err(LlmError::MalformedContent)
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<serde_json::Value> {
        debug!(
            model = %request.model,
            shape = request.response_format.name,
            messages = request.messages.len(),
            "sending chat completion"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), %message, "chat completion failed");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        extract_content(body)
    }
}
