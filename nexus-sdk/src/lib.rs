//! Nexus SDK - Activity memory and query engine
//!
//! This crate provides everything above the synchronous core:
//!
//! # Core Modules (from nexus-core)
//!
//! - **types** - Activity records, compiled blocks, super blocks
//! - **index** - Flat L2 vector index with aligned metadata
//! - **conversation** - Per-session turn history
//!
//! # SDK Modules
//!
//! - **memory** - Tiered memory pipeline (raw, compiled, long-term) and retrieval
//! - **models** - Model references and the HTTP client for Ollama and OpenAI
//! - **orchestrator** - Query state machine from classification to persistence
//! - **tools** - Builtin filesystem tools picked by a model
//! - **code_context** - Source snapshots used to answer code questions
//!
//! # Example
//!
//! ```rust,no_run
//! use nexus_sdk::{Nexus, QueryRequest, SDKConfig};
//! use nexus_sdk::nexus_core::ActivityRecord;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let nexus = Nexus::with_defaults(SDKConfig::new("./data")).await?;
//!
//!     // Record what the user is doing
//!     let record = ActivityRecord::new("Terminal - cargo test", "running tests");
//!     nexus.pipeline().observe(record).await;
//!
//!     // Ask about it
//!     let state = nexus.ask(QueryRequest::new("what did I do last?")).await;
//!     println!("{}", state.answer);
//!
//!     Ok(())
//! }
//! ```

pub use nexus_core;

pub mod code_context;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod tools;

mod config;
mod error;
mod sdk;

// Re-export main SDK types
pub use config::{
    ConfigValidationError, MAX_TOOL_ATTEMPTS, MemoryConfig, ModelsConfig, OrchestratorConfig,
    SDKConfig,
};
pub use error::{SDKError, SDKResult};
pub use sdk::Nexus;

pub use code_context::{CodeContext, CodeSnapshotStore};
pub use memory::{
    CycleReport, Embedder, EmbeddingService, HashingEmbedder, MemoryPipeline, MemoryRetriever,
    MemoryStats, ObservationHandle, ObservationSource, RetrievalMode, RetrievalRequest,
};
pub use models::{ModelClient, ModelOverrides, ModelProvider, ModelRef, PromptStyle};
pub use orchestrator::{Intent, Node, OrchestrationState, Orchestrator, QueryRequest};
pub use tools::{BuiltinTool, BuiltinToolAgent, ToolAgent};
