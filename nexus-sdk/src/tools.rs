//! Tool execution for command-style requests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use nexus_core::util::truncate_chars;

use crate::models::{ModelClient, ModelRef, Prompt};
use crate::{SDKError, SDKResult};

/// Characters returned by `read_file`.
pub const READ_FILE_LIMIT: usize = 3000;

/// Executes a natural-language command and returns its textual output.
///
/// Implementations may report tool-level problems either as `Err` or as output
/// text; the orchestrator treats both as failures.
#[async_trait]
pub trait ToolAgent: Send + Sync {
    async fn run(&self, request: &str) -> SDKResult<String>;
}

/// Tools the builtin agent can pick from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum BuiltinTool {
    ListDirectory { path: String },
    ReadFile { path: String },
}

impl BuiltinTool {
    /// Run the tool. Filesystem errors come back as output text.
    pub async fn execute(&self) -> String {
        match self {
            Self::ListDirectory { path } => list_directory(Path::new(path)).await,
            Self::ReadFile { path } => read_file(Path::new(path)).await,
        }
    }
}

async fn list_directory(path: &Path) -> String {
    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) => return format!("Error listing directory: {e}"),
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
            Ok(None) => break,
            Err(e) => return format!("Error listing directory: {e}"),
        }
    }

    if names.is_empty() {
        return "Directory is empty.".to_string();
    }
    names.sort();
    names.join("\n")
}

async fn read_file(path: &Path) -> String {
    match tokio::fs::read(path).await {
        Ok(bytes) => truncate_chars(&String::from_utf8_lossy(&bytes), READ_FILE_LIMIT).to_string(),
        Err(e) => format!("Error opening file: {e}"),
    }
}

const TOOL_SELECTION_PROMPT: &str = r#"You translate a user's command into exactly one tool call.
Available tools:
- list_directory: lists the entries of a directory. Argument: path.
- read_file: returns up to 3000 characters of a text file. Argument: path.

Reply ONLY with a JSON object such as {"tool": "read_file", "path": "/home/me/notes.txt"}.
If no tool fits, reply {"tool": "none", "reason": "..."}."#;

#[derive(Deserialize)]
struct NoTool {
    #[serde(default)]
    reason: String,
}

/// Tool agent that lets a model choose one builtin tool and runs it.
pub struct BuiltinToolAgent {
    models: Arc<dyn ModelClient>,
    model: ModelRef,
}

impl BuiltinToolAgent {
    pub fn new(models: Arc<dyn ModelClient>, model: ModelRef) -> Self {
        Self { models, model }
    }

    fn parse_selection(reply: &str) -> SDKResult<BuiltinTool> {
        let cleaned = crate::orchestrator::strip_code_fences(reply);
        match serde_json::from_str::<BuiltinTool>(cleaned) {
            Ok(tool) => Ok(tool),
            Err(_) => {
                let reason = serde_json::from_str::<NoTool>(cleaned)
                    .map(|n| n.reason)
                    .unwrap_or_default();
                Err(SDKError::tool(if reason.is_empty() {
                    format!("no tool matches the request (model replied: {})", truncate_chars(reply, 200))
                } else {
                    format!("no tool matches the request: {reason}")
                }))
            }
        }
    }
}

#[async_trait]
impl ToolAgent for BuiltinToolAgent {
    async fn run(&self, request: &str) -> SDKResult<String> {
        let reply = self
            .models
            .answer(&self.model, TOOL_SELECTION_PROMPT, &Prompt::from(request), true)
            .await?;
        let tool = Self::parse_selection(&reply)?;
        info!(?tool, "Running tool");

        let output = tool.execute().await;
        debug!(chars = output.len(), "Tool finished");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedModel(&'static str);

    #[async_trait]
    impl ModelClient for FixedModel {
        async fn answer(&self, _: &ModelRef, _: &str, _: &Prompt, _: bool) -> SDKResult<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_list_directory_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        assert_eq!(list_directory(dir.path()).await, "a.txt\nb.txt");
    }

    #[tokio::test]
    async fn test_list_missing_directory_reports_error_text() {
        let out = list_directory(Path::new("/definitely/not/here")).await;
        assert!(out.to_lowercase().contains("error"));
    }

    #[tokio::test]
    async fn test_read_file_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "y".repeat(5000)).unwrap();
        assert_eq!(read_file(&path).await.len(), READ_FILE_LIMIT);
    }

    #[tokio::test]
    async fn test_agent_runs_selected_tool() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "remember the milk").unwrap();

        let reply: &'static str = Box::leak(
            format!(
                "```json\n{{\"tool\": \"read_file\", \"path\": {}}}\n```",
                serde_json::to_string(&path.to_string_lossy()).unwrap()
            )
            .into_boxed_str(),
        );
        let agent = BuiltinToolAgent::new(Arc::new(FixedModel(reply)), ModelRef::new("gpt-4o-mini"));
        assert_eq!(agent.run("read my notes").await.unwrap(), "remember the milk");
    }

    #[tokio::test]
    async fn test_agent_without_matching_tool_errors() {
        let agent = BuiltinToolAgent::new(
            Arc::new(FixedModel(r#"{"tool": "none", "reason": "cannot take screenshots"}"#)),
            ModelRef::new("gpt-4o-mini"),
        );
        let err = agent.run("take a screenshot").await.unwrap_err();
        assert!(err.to_string().contains("cannot take screenshots"));
    }
}
