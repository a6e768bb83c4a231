//! Main SDK Entry Point
//!
//! Ties the memory pipeline, retriever, conversation store and orchestrator
//! together over one data directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;

use nexus_core::trace::TraceLog;
use nexus_core::ConversationStore;

use crate::code_context::CodeSnapshotStore;
use crate::memory::{
    Embedder, EmbeddingService, MemoryPipeline, MemoryRetriever, ObservationHandle,
    ObservationSource,
};
use crate::models::{HttpModelClient, ModelClient};
use crate::orchestrator::{OrchestrationState, Orchestrator, QueryRequest};
use crate::tools::{BuiltinToolAgent, ToolAgent};
use crate::{SDKConfig, SDKResult};

/// Nexus - Main entry point
///
/// # Example
///
/// ```rust,no_run
/// use nexus_sdk::{Nexus, QueryRequest, SDKConfig};
///
/// async fn example() -> anyhow::Result<()> {
///     let nexus = Nexus::with_defaults(SDKConfig::new("./data")).await?;
///
///     let state = nexus.ask(QueryRequest::new("what did I do yesterday?")).await;
///     println!("{}", state.answer);
///
///     Ok(())
/// }
/// ```
pub struct Nexus {
    config: SDKConfig,
    pipeline: Arc<MemoryPipeline>,
    orchestrator: Orchestrator,
    snapshots: CodeSnapshotStore,
}

impl Nexus {
    /// Open the engine with the given backends.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The embedder's dimension differs from `memory.embedding_dim`
    /// - A persisted store cannot be read
    pub async fn open(
        config: SDKConfig,
        embedder: Arc<dyn Embedder>,
        models: Arc<dyn ModelClient>,
    ) -> SDKResult<Self> {
        let tools: Arc<dyn ToolAgent> = Arc::new(BuiltinToolAgent::new(
            Arc::clone(&models),
            config.models.fallback.clone(),
        ));
        Self::open_with_tools(config, embedder, models, tools).await
    }

    /// Open the engine with a custom tool agent.
    pub async fn open_with_tools(
        config: SDKConfig,
        embedder: Arc<dyn Embedder>,
        models: Arc<dyn ModelClient>,
        tools: Arc<dyn ToolAgent>,
    ) -> SDKResult<Self> {
        config.validate()?;
        let paths = config.paths();

        let pipeline = Arc::new(MemoryPipeline::open(
            config.memory.clone(),
            paths.clone(),
            Arc::clone(&embedder),
        )
        .await?);
        let retriever = MemoryRetriever::new(pipeline.index(), embedder, &config.memory);

        let conversations = ConversationStore::load(
            paths.turns(),
            paths.sessions(),
            config.orchestrator.stored_turns,
        );
        let snapshots = CodeSnapshotStore::new(paths.code_versions());

        let orchestrator = Orchestrator::new(
            config.orchestrator.clone(),
            config.models.clone(),
            models,
            retriever,
            Arc::new(Mutex::new(conversations)),
            tools,
        )
        .with_code_context(Arc::new(snapshots.clone()))
        .with_trace(TraceLog::new(paths.execution_trace()));

        info!(data_dir = %config.data_dir.display(), "Nexus opened");

        Ok(Self {
            config,
            pipeline,
            orchestrator,
            snapshots,
        })
    }

    /// Open the engine with the HTTP model client and the default embedder.
    pub async fn with_defaults(config: SDKConfig) -> SDKResult<Self> {
        let models: Arc<dyn ModelClient> = Arc::new(HttpModelClient::new(&config.models)?);
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingService::new());
        Self::open(config, embedder, models).await
    }

    /// Get the SDK configuration
    pub fn config(&self) -> &SDKConfig {
        &self.config
    }

    /// Get the memory pipeline
    pub fn pipeline(&self) -> Arc<MemoryPipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Answer one query.
    pub async fn ask(&self, request: QueryRequest) -> OrchestrationState {
        self.orchestrator.handle(request).await
    }

    /// Run another tool attempt for a failed tool query.
    pub async fn retry(&self, previous: OrchestrationState) -> OrchestrationState {
        self.orchestrator.retry(previous).await
    }

    /// Write a code snapshot of `project_root`.
    pub fn snapshot(&self, project_root: &Path) -> SDKResult<std::path::PathBuf> {
        self.snapshots.snapshot(project_root)
    }

    /// Start the background observation loop at the configured interval.
    pub fn start_observing(&self, source: Arc<dyn ObservationSource>) -> ObservationHandle {
        let period = Duration::from_secs(self.config.memory.observation_interval_secs);
        self.pipeline().spawn_observation_loop(source, period)
    }

    /// Fresh identifier for a chat session.
    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
