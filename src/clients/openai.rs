//! OpenAI-compatible chat-completions client

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::traits::{ChatMessage, ChatModel, ModelError};
use crate::config::{DEFAULT_API_BASE, DEFAULT_MODEL, ModelConfig};

const ERROR_BODY_CAP: usize = 500;

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: Option<String>, model: Option<String>) -> Result<Self, ModelError> {
        Self::with_settings(
            api_key,
            model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            DEFAULT_API_BASE.to_string(),
            Duration::from_secs(120),
        )
    }

    pub fn from_config(config: &ModelConfig, api_key: Option<String>) -> Result<Self, ModelError> {
        Self::with_settings(
            api_key,
            config.name.clone(),
            config.api_base.clone(),
            Duration::from_millis(config.http_timeout_ms),
        )
    }

    fn with_settings(
        api_key: Option<String>,
        model: String,
        api_base: String,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ModelError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Transport(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        debug!(
            "Requesting chat completion (model={}, messages={})",
            self.model,
            messages.len()
        );
        let started = Instant::now();

        let body = ChatRequest {
            model: &self.model,
            messages,
        };
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::Http {
                status: status.as_u16(),
                body: truncate_snippet(error_text.trim(), ERROR_BODY_CAP),
                hint: classify_status(status.as_u16()),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)?;

        debug!(
            "Chat completion received ({} chars in {}ms)",
            content.len(),
            started.elapsed().as_millis()
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn classify_status(status: u16) -> Option<&'static str> {
    match status {
        401 | 403 => Some("auth"),
        429 => Some("rate_limit"),
        500..=599 => Some("server"),
        _ => None,
    }
}

fn truncate_snippet(input: &str, max: usize) -> String {
    if input.len() <= max {
        return input.to_string();
    }
    let mut end = max;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &input[..end])
}
