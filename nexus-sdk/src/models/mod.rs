//! Language model references, prompts and the client seam.
//!
//! The orchestrator only sees [`ModelClient`]; [`HttpModelClient`] is the
//! default implementation talking to Ollama and OpenAI-compatible servers.

mod http;

pub use http::HttpModelClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::SDKResult;
use crate::config::ModelsConfig;

/// Backend serving a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

/// How conversation history is handed to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyle {
    /// Role-tagged message list
    Chat,
    /// Single transcript ending in an open assistant turn
    Flattened,
}

/// A model name with its backend and prompt style.
///
/// Deserializes from either a bare name (`"gpt-4o-mini"`) or a table; missing
/// provider/style are inferred from the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ModelRefRepr")]
pub struct ModelRef {
    pub name: String,
    pub provider: ModelProvider,
    pub style: PromptStyle,
}

impl ModelRef {
    /// Build a reference, inferring provider and style from the name.
    ///
    /// Names containing `gpt-` go to OpenAI with chat-style prompts; everything
    /// else is served by Ollama with flattened prompts.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (provider, style) = if name.contains("gpt-") {
            (ModelProvider::OpenAi, PromptStyle::Chat)
        } else {
            (ModelProvider::Ollama, PromptStyle::Flattened)
        };
        Self {
            name,
            provider,
            style,
        }
    }

    /// Override the prompt style
    pub fn with_style(mut self, style: PromptStyle) -> Self {
        self.style = style;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelRefRepr {
    Name(String),
    Full {
        name: String,
        provider: Option<ModelProvider>,
        style: Option<PromptStyle>,
    },
}

impl From<ModelRefRepr> for ModelRef {
    fn from(repr: ModelRefRepr) -> Self {
        match repr {
            ModelRefRepr::Name(name) => ModelRef::new(name),
            ModelRefRepr::Full {
                name,
                provider,
                style,
            } => {
                let inferred = ModelRef::new(name);
                ModelRef {
                    provider: provider.unwrap_or(inferred.provider),
                    style: style.unwrap_or(inferred.style),
                    name: inferred.name,
                }
            }
        }
    }
}

/// Logical role a model plays in the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Router,
    Memory,
    Code,
    Fallback,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Router => "router",
            Self::Memory => "memory",
            Self::Code => "code",
            Self::Fallback => "fallback",
        }
    }
}

/// Per-request model choices that take precedence over the configured roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOverrides {
    pub router: Option<ModelRef>,
    pub memory: Option<ModelRef>,
    pub code: Option<ModelRef>,
    pub fallback: Option<ModelRef>,
}

impl ModelOverrides {
    /// Model to use for `role`
    pub fn resolve(&self, role: ModelRole, config: &ModelsConfig) -> ModelRef {
        let (over, base) = match role {
            ModelRole::Router => (&self.router, &config.router),
            ModelRole::Memory => (&self.memory, &config.memory),
            ModelRole::Code => (&self.code, &config.code),
            ModelRole::Fallback => (&self.fallback, &config.fallback),
        };
        over.clone().unwrap_or_else(|| base.clone())
    }

    /// Set every role to the same model
    pub fn all(model: ModelRef) -> Self {
        Self {
            router: Some(model.clone()),
            memory: Some(model.clone()),
            code: Some(model.clone()),
            fallback: Some(model),
        }
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// User-side payload of a model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Messages(Vec<ChatMessage>),
    Text(String),
}

impl Prompt {
    /// Prompt as plain text; message lists are flattened into a transcript.
    pub fn to_text(&self) -> String {
        match self {
            Prompt::Text(text) => text.clone(),
            Prompt::Messages(messages) => messages
                .iter()
                .map(|m| match m.role {
                    Role::System => format!("System: {}", m.content),
                    Role::User => format!("User: {}", m.content),
                    Role::Assistant => format!("Assistant: {}", m.content),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Prompt::Text(text.to_string())
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Prompt::Text(text)
    }
}

/// A language model backend.
///
/// Calls block until the full reply is available; timeouts belong to the
/// implementation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a system instruction and a prompt, returning the reply text.
    ///
    /// `json_mode` asks the backend for a single JSON object.
    async fn answer(
        &self,
        model: &ModelRef,
        system: &str,
        prompt: &Prompt,
        json_mode: bool,
    ) -> SDKResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ref_inference() {
        let gpt = ModelRef::new("gpt-4o-mini");
        assert_eq!(gpt.provider, ModelProvider::OpenAi);
        assert_eq!(gpt.style, PromptStyle::Chat);

        let local = ModelRef::new("llama3:8b");
        assert_eq!(local.provider, ModelProvider::Ollama);
        assert_eq!(local.style, PromptStyle::Flattened);
    }

    #[test]
    fn test_model_ref_deserialize_forms() {
        let bare: ModelRef = serde_json::from_str(r#""gpt-4o""#).unwrap();
        assert_eq!(bare.provider, ModelProvider::OpenAi);

        let table: ModelRef =
            serde_json::from_str(r#"{"name": "mistral", "style": "chat"}"#).unwrap();
        assert_eq!(table.provider, ModelProvider::Ollama);
        assert_eq!(table.style, PromptStyle::Chat);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = ModelsConfig::default();
        let overrides = ModelOverrides {
            code: Some(ModelRef::new("qwen2.5-coder")),
            ..Default::default()
        };
        assert_eq!(overrides.resolve(ModelRole::Code, &config).name, "qwen2.5-coder");
        assert_eq!(overrides.resolve(ModelRole::Router, &config), config.router);
    }

    #[test]
    fn test_prompt_to_text() {
        let prompt = Prompt::Messages(vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]);
        assert_eq!(prompt.to_text(), "User: hi\nAssistant: hello");
    }
}
