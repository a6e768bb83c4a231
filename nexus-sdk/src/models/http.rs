//! HTTP model client for Ollama and OpenAI-compatible chat APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatMessage, ModelClient, ModelProvider, ModelRef, Prompt};
use crate::config::ModelsConfig;
use crate::{SDKError, SDKResult};

const CONTINUE_PROMPT: &str = "Continue exactly where you stopped.";

/// Model client speaking Ollama `/api/chat` and OpenAI `/v1/chat/completions`.
pub struct HttpModelClient {
    client: Client,
    ollama_url: String,
    openai_url: String,
    openai_api_key: Option<String>,
    max_continuations: u32,
}

impl HttpModelClient {
    /// Create a client from model configuration.
    pub fn new(config: &ModelsConfig) -> SDKResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            ollama_url: config.ollama_url.trim_end_matches('/').to_string(),
            openai_url: config.openai_url.trim_end_matches('/').to_string(),
            openai_api_key: config.openai_api_key.clone(),
            max_continuations: config.max_continuations,
        })
    }

    fn messages(system: &str, prompt: &Prompt) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(system)];
        match prompt {
            Prompt::Messages(list) => messages.extend(list.iter().cloned()),
            Prompt::Text(text) => messages.push(ChatMessage::user(text.clone())),
        }
        messages
    }

    async fn ollama(&self, model: &str, messages: Vec<ChatMessage>, json_mode: bool) -> SDKResult<String> {
        let body = OllamaRequest {
            model,
            messages,
            stream: false,
            format: json_mode.then_some("json"),
        };

        let response: OllamaResponse = self
            .client
            .post(format!("{}/api/chat", self.ollama_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.message.content)
    }

    async fn openai(&self, model: &str, mut messages: Vec<ChatMessage>, json_mode: bool) -> SDKResult<String> {
        let key = self
            .openai_api_key
            .as_deref()
            .ok_or_else(|| SDKError::model("OPENAI_API_KEY is not configured"))?;

        let mut full = String::new();
        let mut continuations = 0;

        loop {
            let body = OpenAiRequest {
                model,
                messages: &messages,
                response_format: json_mode.then_some(ResponseFormat {
                    kind: "json_object",
                }),
            };

            let response: OpenAiResponse = self
                .client
                .post(format!("{}/v1/chat/completions", self.openai_url))
                .bearer_auth(key)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let choice = response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| SDKError::model("OpenAI response had no choices"))?;
            let part = choice.message.content.unwrap_or_default();
            full.push_str(&part);

            if choice.finish_reason.as_deref() != Some("length") {
                break;
            }
            if continuations >= self.max_continuations {
                warn!(model, continuations, "Reply still truncated, returning partial text");
                break;
            }
            continuations += 1;
            debug!(model, continuations, "Reply truncated, requesting continuation");
            messages.push(ChatMessage::assistant(part));
            messages.push(ChatMessage::user(CONTINUE_PROMPT));
        }

        Ok(full)
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn answer(
        &self,
        model: &ModelRef,
        system: &str,
        prompt: &Prompt,
        json_mode: bool,
    ) -> SDKResult<String> {
        let messages = Self::messages(system, prompt);
        debug!(model = %model.name, provider = ?model.provider, json_mode, "Calling model");

        let reply = match model.provider {
            ModelProvider::Ollama => self.ollama(&model.name, messages, json_mode).await?,
            ModelProvider::OpenAi => self.openai(&model.name, messages, json_mode).await?,
        };
        Ok(reply.trim().to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}
