//! SDK Configuration
//!
//! Defines configuration options for the Nexus SDK.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use nexus_core::DataPaths;

use crate::models::ModelRef;

/// Tool invocations allowed per query before giving up.
pub const MAX_TOOL_ATTEMPTS: u32 = 2;

/// SDK configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SDKConfig {
    /// Directory holding the index, JSON stores, history and snapshots
    pub data_dir: PathBuf,

    /// Memory tiering and retrieval configuration
    pub memory: MemoryConfig,

    /// Model roles and backends
    pub models: ModelsConfig,

    /// Query orchestration configuration
    pub orchestrator: OrchestratorConfig,
}

impl Default for SDKConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("nexus-data"),
            memory: MemoryConfig::default(),
            models: ModelsConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

/// Memory tiering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Raw records kept in the buffer (default: 20)
    pub raw_buffer_cap: usize,

    /// Records compacted into one block (default: 20)
    pub compaction_batch: usize,

    /// Raw records retained after a compaction (default: 10)
    pub raw_retained_after_compaction: usize,

    /// Compiled blocks kept before trimming (default: 36)
    pub medium_cap: usize,

    /// Compiled blocks kept after a trim (default: 16)
    pub medium_trim_to: usize,

    /// Compiled blocks consolidated into one super block (default: 36)
    pub consolidation_batch: usize,

    /// Compiled blocks dropped per consolidation (default: 20)
    pub consolidation_drop: usize,

    /// Super blocks kept (default: 50)
    pub long_term_cap: usize,

    /// Embedding dimension (default: 384)
    pub embedding_dim: usize,

    /// Nearest neighbors fetched before ranking (default: 50)
    pub semantic_candidates: usize,

    /// Maximum results for a temporal lookup (default: 8)
    pub temporal_limit: usize,

    /// Results returned by a semantic lookup (default: 8)
    pub default_k: usize,

    /// Add super blocks to the vector index (default: true)
    pub index_long_term: bool,

    /// Seconds between observation cycles (default: 30)
    pub observation_interval_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            raw_buffer_cap: 20,
            compaction_batch: 20,
            raw_retained_after_compaction: 10,
            medium_cap: 36,
            medium_trim_to: 16,
            consolidation_batch: 36,
            consolidation_drop: 20,
            long_term_cap: 50,
            embedding_dim: 384,
            semantic_candidates: 50,
            temporal_limit: 8,
            default_k: 8,
            index_long_term: true,
            observation_interval_secs: 30,
        }
    }
}

/// Model role assignments and backend endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Intent classifier
    pub router: ModelRef,

    /// Answers grounded in retrieved memory
    pub memory: ModelRef,

    /// Code review answers
    pub code: ModelRef,

    /// Direct answers, failure analysis and tool selection
    pub fallback: ModelRef,

    /// Base URL of the Ollama server
    pub ollama_url: String,

    /// Base URL of the OpenAI-compatible API
    pub openai_url: String,

    /// API key for OpenAI models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    /// HTTP timeout per model call in seconds (default: 300)
    pub request_timeout_secs: u64,

    /// Continuation requests after a length-truncated reply (default: 3)
    pub max_continuations: u32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            router: ModelRef::new("gemma:2b"),
            memory: ModelRef::new("gemma:2b"),
            code: ModelRef::new("deepseek-coder:6.7b-instruct"),
            fallback: ModelRef::new("gpt-4o-mini"),
            ollama_url: "http://localhost:11434".into(),
            openai_url: "https://api.openai.com".into(),
            openai_api_key: None,
            request_timeout_secs: 300,
            max_continuations: 3,
        }
    }
}

/// Query orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Tool invocations allowed per query (default: [`MAX_TOOL_ATTEMPTS`])
    pub max_tool_attempts: u32,

    /// Past turns sent to answer models (default: 8)
    pub history_turns: usize,

    /// Turns stored per session (default: 10)
    pub stored_turns: usize,

    /// Characters of each memory summary injected as context (default: 500)
    pub memory_snippet_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_attempts: MAX_TOOL_ATTEMPTS,
            history_turns: 8,
            stored_turns: 10,
            memory_snippet_chars: 500,
        }
    }
}

impl MemoryConfig {
    /// Check the tier sizes against each other.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.embedding_dim == 0 {
            return Err(invalid("memory.embedding_dim", "must be greater than 0"));
        }
        if self.compaction_batch == 0 || self.raw_buffer_cap < self.compaction_batch {
            return Err(invalid(
                "memory.compaction_batch",
                "must be greater than 0 and not exceed memory.raw_buffer_cap",
            ));
        }
        if self.raw_retained_after_compaction >= self.compaction_batch {
            return Err(invalid(
                "memory.raw_retained_after_compaction",
                "must be smaller than memory.compaction_batch",
            ));
        }
        if self.medium_trim_to == 0 || self.medium_trim_to >= self.medium_cap {
            return Err(invalid(
                "memory.medium_trim_to",
                "must be between 1 and memory.medium_cap - 1",
            ));
        }
        if self.consolidation_drop == 0 || self.consolidation_drop > self.consolidation_batch {
            return Err(invalid(
                "memory.consolidation_drop",
                "must be between 1 and memory.consolidation_batch",
            ));
        }
        if self.long_term_cap == 0 {
            return Err(invalid("memory.long_term_cap", "must be greater than 0"));
        }
        if self.observation_interval_secs == 0 {
            return Err(invalid(
                "memory.observation_interval_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl SDKConfig {
    /// Create a new SDK config rooted at the given data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set memory configuration
    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Set model configuration
    pub fn with_models(mut self, models: ModelsConfig) -> Self {
        self.models = models;
        self
    }

    /// Set orchestrator configuration
    pub fn with_orchestrator(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// File layout under `data_dir`
    pub fn paths(&self) -> DataPaths {
        DataPaths::new(&self.data_dir)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.memory.validate()?;

        for (field, model) in [
            ("models.router", &self.models.router),
            ("models.memory", &self.models.memory),
            ("models.code", &self.models.code),
            ("models.fallback", &self.models.fallback),
        ] {
            if model.name.trim().is_empty() {
                return Err(invalid(field, "model name is required"));
            }
        }

        if self.orchestrator.stored_turns == 0 {
            return Err(invalid("orchestrator.stored_turns", "must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigValidationError {
    ConfigValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelProvider, PromptStyle};

    #[test]
    fn test_default_config() {
        let config = SDKConfig::default();
        assert_eq!(config.memory.raw_buffer_cap, 20);
        assert_eq!(config.memory.medium_cap, 36);
        assert_eq!(config.memory.long_term_cap, 50);
        assert_eq!(config.orchestrator.max_tool_attempts, MAX_TOOL_ATTEMPTS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_model_roles() {
        let models = ModelsConfig::default();
        assert_eq!(models.router.provider, ModelProvider::Ollama);
        assert_eq!(models.router.style, PromptStyle::Flattened);
        assert_eq!(models.fallback.provider, ModelProvider::OpenAi);
        assert_eq!(models.fallback.style, PromptStyle::Chat);
    }

    #[test]
    fn test_config_builder() {
        let config = SDKConfig::new("/tmp/nexus").with_orchestrator(OrchestratorConfig {
            history_turns: 4,
            ..Default::default()
        });
        assert_eq!(config.data_dir, PathBuf::from("/tmp/nexus"));
        assert_eq!(config.orchestrator.history_turns, 4);
        assert_eq!(
            config.paths().turns(),
            PathBuf::from("/tmp/nexus/conversations/turns.json")
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = SDKConfig::default();
        config.memory.medium_trim_to = 36;
        assert!(config.validate().is_err());

        let mut config = SDKConfig::default();
        config.memory.raw_buffer_cap = 10;
        assert!(config.validate().is_err());

        let mut config = SDKConfig::default();
        config.models.code.name = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_memory_validation_rejects_zero_drop() {
        let memory = MemoryConfig {
            consolidation_drop: 0,
            ..Default::default()
        };
        assert!(memory.validate().is_err());
        assert!(SDKConfig::default().with_memory(memory).validate().is_err());
        assert!(MemoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_like_json_uses_defaults() {
        let config: SDKConfig =
            serde_json::from_str(r#"{"memory": {"long_term_cap": 5}}"#).unwrap();
        assert_eq!(config.memory.long_term_cap, 5);
        assert_eq!(config.memory.medium_cap, 36);
        assert_eq!(config.models.code.name, "deepseek-coder:6.7b-instruct");
    }
}
