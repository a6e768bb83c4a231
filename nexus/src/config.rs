//! Configuration management for nexus.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (NEXUS_*, OPENAI_API_KEY)
//! 2. Config file (~/.config/nexus/config.toml)
//! 3. Default values

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use nexus_sdk::{MemoryConfig, ModelRef, ModelsConfig, OrchestratorConfig, SDKConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Paths
    pub paths: PathsConfig,

    /// Model roles and endpoints
    pub models: ModelsConfig,

    /// Memory tiering settings
    pub memory: MemoryConfig,

    /// Query orchestration settings
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for nexus data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "nexus", "nexus")
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = project_dirs() {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nexus")
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("NEXUS_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("NEXUS_OLLAMA_URL") {
            self.models.ollama_url = url;
        }
        if let Some(url) = lookup("NEXUS_OPENAI_URL") {
            self.models.openai_url = url;
        }
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.models.openai_api_key = Some(key);
        }
        if let Some(name) = lookup("NEXUS_FALLBACK_MODEL") {
            self.models.fallback = ModelRef::new(name);
        }
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        match project_dirs() {
            Some(proj_dirs) => proj_dirs.config_dir().join("config.toml"),
            None => default_data_dir().join("config.toml"),
        }
    }

    /// SDK configuration for this CLI configuration.
    pub fn sdk_config(&self) -> SDKConfig {
        SDKConfig::new(&self.paths.data_dir)
            .with_models(self.models.clone())
            .with_memory(self.memory.clone())
            .with_orchestrator(self.orchestrator.clone())
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.paths.data_dir).context("Failed to create data directory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.orchestrator.max_tool_attempts, 2);
        assert_eq!(config.memory.raw_buffer_cap, 20);
        assert!(config.models.openai_api_key.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[paths]
data_dir = "/var/lib/nexus"

[models]
memory = "llama3"
fallback = { name = "gpt-4o", provider = "openai", style = "chat" }

[memory]
observation_interval_secs = 10
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).expect("Failed to load config");
        assert_eq!(config.paths.data_dir, PathBuf::from("/var/lib/nexus"));
        assert_eq!(config.models.memory.name, "llama3");
        assert_eq!(config.models.fallback.name, "gpt-4o");
        assert_eq!(config.models.router.name, "gemma:2b");
        assert_eq!(config.memory.observation_interval_secs, 10);
        assert_eq!(config.memory.medium_cap, 36);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("NEXUS_DATA_DIR", "/tmp/nexus"),
            ("OPENAI_API_KEY", "sk-test"),
            ("NEXUS_OLLAMA_URL", "http://gpu-box:11434"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.paths.data_dir, PathBuf::from("/tmp/nexus"));
        assert_eq!(config.models.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.models.ollama_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_sdk_config_uses_data_dir() {
        let temp = tempdir().expect("Failed to create temp dir");
        let config = Config {
            paths: PathsConfig {
                data_dir: temp.path().join("data"),
            },
            ..Config::default()
        };

        config.ensure_dirs().expect("Failed to create directories");
        assert!(config.paths.data_dir.exists());
        assert!(config.sdk_config().validate().is_ok());
        assert_eq!(config.sdk_config().data_dir, temp.path().join("data"));
    }
}
