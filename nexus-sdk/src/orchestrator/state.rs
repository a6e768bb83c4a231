//! Per-query state and the node graph.

use std::time::Duration;

use chrono::NaiveDate;

use nexus_core::conversation::DEFAULT_SESSION;
use nexus_core::trace::TraceRecord;

use super::intent::Intent;
use crate::models::ModelOverrides;

/// Substring of a tool failure detail that routes to failure analysis.
pub const TOOL_FAILURE_MARKER: &str = "Erro ao executar";

/// Node of the orchestration graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    ProcessQuery,
    Interpret,
    RetrieveMemory,
    GenerateWithMemory,
    InterpretCode,
    DirectAnswer,
    ExecuteTool,
    AnalyzeFailure,
    PersistTurn,
    Finalize,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessQuery => "process_query",
            Self::Interpret => "interpret",
            Self::RetrieveMemory => "retrieve_memory",
            Self::GenerateWithMemory => "generate_with_memory",
            Self::InterpretCode => "interpret_code",
            Self::DirectAnswer => "direct_answer",
            Self::ExecuteTool => "execute_tool",
            Self::AnalyzeFailure => "analyze_failure",
            Self::PersistTurn => "persist_turn",
            Self::Finalize => "finalize",
        }
    }

    /// Successor of this node given the state it produced; `None` after finalize.
    pub fn next(self, state: &OrchestrationState) -> Option<Node> {
        match self {
            Self::ProcessQuery => Some(Self::Interpret),
            Self::Interpret => Some(route_intent(&state.intent)),
            Self::RetrieveMemory => Some(Self::GenerateWithMemory),
            Self::GenerateWithMemory
            | Self::InterpretCode
            | Self::DirectAnswer
            | Self::AnalyzeFailure => Some(Self::PersistTurn),
            Self::ExecuteTool => Some(route_after_tool(state)),
            Self::PersistTurn => Some(Self::Finalize),
            Self::Finalize => None,
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Branch taken after classification.
pub fn route_intent(intent: &Intent) -> Node {
    match intent {
        Intent::Semantic | Intent::Temporal { .. } | Intent::MostRecent => Node::RetrieveMemory,
        Intent::Code => Node::InterpretCode,
        Intent::Tools => Node::ExecuteTool,
        Intent::Fallback => Node::DirectAnswer,
    }
}

/// Branch taken after a tool run.
pub fn route_after_tool(state: &OrchestrationState) -> Node {
    match &state.failure_detail {
        Some(detail) if detail.contains(TOOL_FAILURE_MARKER) => Node::AnalyzeFailure,
        _ => Node::PersistTurn,
    }
}

/// Input of one query.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub question: String,
    pub session_id: Option<String>,
    pub overrides: ModelOverrides,
    /// Date relative expressions resolve against; today when unset
    pub reference_date: Option<NaiveDate>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_overrides(mut self, overrides: ModelOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }
}

/// Everything a query's traversal reads and writes.
#[derive(Debug, Clone)]
pub struct OrchestrationState {
    pub question: String,
    pub session_id: String,
    pub reference_date: NaiveDate,
    pub overrides: ModelOverrides,

    pub intent: Intent,
    pub classification_detail: Option<String>,
    pub memory_indices: Vec<usize>,

    /// Visible answer, including the model/time annotation
    pub answer: String,
    /// Set when the answer reports a model failure
    pub answer_failed: bool,

    pub tool_attempts: u32,
    pub failure_detail: Option<String>,

    pub total_processing: Duration,
    pub last_processing: Duration,

    /// Nodes visited in order
    pub path: Vec<Node>,
    pub(crate) trace: Vec<TraceRecord>,
}

impl OrchestrationState {
    pub fn new(request: QueryRequest) -> Self {
        Self {
            question: request.question,
            session_id: request
                .session_id
                .unwrap_or_else(|| DEFAULT_SESSION.to_string()),
            reference_date: request
                .reference_date
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
            overrides: request.overrides,
            intent: Intent::default(),
            classification_detail: None,
            memory_indices: Vec::new(),
            answer: String::new(),
            answer_failed: false,
            tool_attempts: 0,
            failure_detail: None,
            total_processing: Duration::ZERO,
            last_processing: Duration::ZERO,
            path: Vec::new(),
            trace: Vec::new(),
        }
    }

    /// Prepare a finished state for another tool attempt.
    ///
    /// Keeps the question, session, overrides and attempt counter.
    pub(crate) fn reset_for_retry(&mut self) {
        self.answer.clear();
        self.answer_failed = false;
        self.total_processing = Duration::ZERO;
        self.last_processing = Duration::ZERO;
        self.path.clear();
        self.trace.clear();
    }

    /// Whether the last tool run failed
    pub fn tool_failed(&self) -> bool {
        self.failure_detail.is_some()
    }

    pub(crate) fn add_processing(&mut self, elapsed: Duration) {
        self.last_processing = elapsed;
        self.total_processing += elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_intent_is_exhaustive() {
        assert_eq!(route_intent(&Intent::Semantic), Node::RetrieveMemory);
        assert_eq!(route_intent(&Intent::MostRecent), Node::RetrieveMemory);
        assert_eq!(
            route_intent(&Intent::Temporal { start: None, end: None }),
            Node::RetrieveMemory
        );
        assert_eq!(route_intent(&Intent::Code), Node::InterpretCode);
        assert_eq!(route_intent(&Intent::Tools), Node::ExecuteTool);
        assert_eq!(route_intent(&Intent::Fallback), Node::DirectAnswer);
    }

    #[test]
    fn test_route_after_tool() {
        let mut state = OrchestrationState::new(QueryRequest::new("list /tmp"));
        assert_eq!(route_after_tool(&state), Node::PersistTurn);

        state.failure_detail = Some(format!("{TOOL_FAILURE_MARKER} a ferramenta: boom"));
        assert_eq!(route_after_tool(&state), Node::AnalyzeFailure);

        state.failure_detail = Some("unrelated".into());
        assert_eq!(route_after_tool(&state), Node::PersistTurn);
    }

    #[test]
    fn test_defaults() {
        let state = OrchestrationState::new(QueryRequest::new("hi"));
        assert_eq!(state.session_id, "default");
        assert_eq!(state.intent, Intent::Fallback);
        assert_eq!(Node::Finalize.next(&state), None);
    }
}
