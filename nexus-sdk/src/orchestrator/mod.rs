//! Query orchestration state machine.
//!
//! ```text
//! process_query -> interpret -+-> retrieve_memory -> generate_with_memory -+
//!                             +-> interpret_code --------------------------+
//!                             +-> direct_answer ---------------------------+-> persist_turn -> finalize
//!                             +-> execute_tool -+--------------------------+
//!                                               +-> analyze_failure -------+
//! ```
//!
//! A traversal is sequential and always ends in `finalize`. Failures of models,
//! tools or storage surface only through the answer text and the log.

mod intent;
mod nodes;
mod prompts;
mod state;

pub use intent::{Classification, Intent, parse_classification, strip_code_fences};
pub use state::{
    Node, OrchestrationState, QueryRequest, TOOL_FAILURE_MARKER, route_after_tool, route_intent,
};

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use nexus_core::trace::{TraceLog, TraceRecord};
use nexus_core::util::{now_iso, truncate_chars};
use nexus_core::ConversationStore;

use crate::code_context::CodeContext;
use crate::config::{ModelsConfig, OrchestratorConfig};
use crate::memory::MemoryRetriever;
use crate::models::ModelClient;
use crate::tools::ToolAgent;

const TRACE_TEXT_CHARS: usize = 200;

/// Drives queries through the node graph.
pub struct Orchestrator {
    config: OrchestratorConfig,
    models_config: ModelsConfig,
    models: Arc<dyn ModelClient>,
    retriever: MemoryRetriever,
    conversations: Arc<Mutex<ConversationStore>>,
    tools: Arc<dyn ToolAgent>,
    code: Option<Arc<dyn CodeContext>>,
    trace: Option<TraceLog>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        models_config: ModelsConfig,
        models: Arc<dyn ModelClient>,
        retriever: MemoryRetriever,
        conversations: Arc<Mutex<ConversationStore>>,
        tools: Arc<dyn ToolAgent>,
    ) -> Self {
        Self {
            config,
            models_config,
            models,
            retriever,
            conversations,
            tools,
            code: None,
            trace: None,
        }
    }

    /// Set the source of code summaries
    pub fn with_code_context(mut self, code: Arc<dyn CodeContext>) -> Self {
        self.code = Some(code);
        self
    }

    /// Write execution traces to `log`
    pub fn with_trace(mut self, log: TraceLog) -> Self {
        self.trace = Some(log);
        self
    }

    pub fn conversations(&self) -> Arc<Mutex<ConversationStore>> {
        Arc::clone(&self.conversations)
    }

    /// Run a query from `process_query` to `finalize`.
    pub async fn handle(&self, request: QueryRequest) -> OrchestrationState {
        self.run_from(Node::ProcessQuery, OrchestrationState::new(request))
            .await
    }

    /// Run another tool attempt for a query whose tool run failed.
    ///
    /// Re-enters at `execute_tool` with the attempt counter carried over, so the
    /// attempt after the limit gives up without invoking the tool. Any other
    /// state is returned unchanged.
    pub async fn retry(&self, mut previous: OrchestrationState) -> OrchestrationState {
        if previous.intent != Intent::Tools || !previous.tool_failed() {
            debug!(intent = ?previous.intent, "Nothing to retry");
            return previous;
        }
        previous.reset_for_retry();
        self.run_from(Node::ExecuteTool, previous).await
    }

    async fn run_from(&self, start: Node, mut state: OrchestrationState) -> OrchestrationState {
        let mut next = Some(start);

        while let Some(node) = next {
            debug!(node = node.as_str(), "Entering node");
            let started_at = now_iso();

            match node {
                Node::ProcessQuery => self.process_query(&mut state),
                Node::Interpret => self.interpret(&mut state).await,
                Node::RetrieveMemory => self.retrieve_memory(&mut state).await,
                Node::GenerateWithMemory => self.generate_with_memory(&mut state).await,
                Node::InterpretCode => self.interpret_code(&mut state).await,
                Node::DirectAnswer => self.direct_answer(&mut state).await,
                Node::ExecuteTool => self.execute_tool(&mut state).await,
                Node::AnalyzeFailure => self.analyze_failure(&mut state).await,
                Node::PersistTurn => self.persist_turn(&state).await,
                Node::Finalize => self.finalize(&state, started_at.clone()),
            }

            state.path.push(node);
            if node != Node::Finalize {
                state.trace.push(trace_record(node, started_at, &state));
            }
            next = node.next(&state);
        }

        info!(
            session = %state.session_id,
            intent = %state.intent,
            elapsed_ms = state.total_processing.as_millis() as u64,
            "Query finished"
        );
        state
    }
}

fn trace_record(node: Node, started_at: String, state: &OrchestrationState) -> TraceRecord {
    let (question, outcome) = match node {
        Node::ProcessQuery => (Some(state.question.clone()), None),
        Node::Interpret => (None, Some(state.intent.to_string())),
        Node::RetrieveMemory => (None, Some(format!("{} blocks", state.memory_indices.len()))),
        Node::ExecuteTool if state.tool_failed() => (None, state.failure_detail.clone()),
        Node::GenerateWithMemory
        | Node::InterpretCode
        | Node::DirectAnswer
        | Node::ExecuteTool
        | Node::AnalyzeFailure => (
            None,
            Some(truncate_chars(&state.answer, TRACE_TEXT_CHARS).to_string()),
        ),
        Node::PersistTurn | Node::Finalize => (None, None),
    };
    TraceRecord {
        node: node.as_str().to_string(),
        started_at,
        finished_at: now_iso(),
        question,
        outcome,
    }
}

