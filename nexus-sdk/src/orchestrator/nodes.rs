//! Node implementations.

use std::time::Instant;

use tracing::{debug, info, warn};

use nexus_core::ConversationTurn;
use nexus_core::trace::TraceRecord;
use nexus_core::util::{now_iso, truncate_chars};

use super::intent::{Classification, Intent, parse_classification};
use super::prompts;
use super::state::{OrchestrationState, TOOL_FAILURE_MARKER};
use super::{Orchestrator, TRACE_TEXT_CHARS};
use crate::memory::RetrievalRequest;
use crate::models::{ModelRef, ModelRole, Prompt};
use crate::{SDKError, SDKResult};

/// Start of the annotation appended to model answers.
pub(crate) const ANNOTATION_MARKER: &str = "\n\n*Model";

/// Start of an answer that reports a model failure.
pub(crate) const MODEL_ERROR_PREFIX: &str = "An error occurred";

/// Tool output fragments treated as failures, matched case-insensitively.
const TOOL_ERROR_FRAGMENTS: [&str; 2] = ["error", "não encontrado"];

impl Orchestrator {
    pub(super) fn process_query(&self, state: &mut OrchestrationState) {
        state.question = state.question.trim().to_string();
        if state.session_id.trim().is_empty() {
            state.session_id = nexus_core::conversation::DEFAULT_SESSION.to_string();
        }
        state.total_processing = std::time::Duration::ZERO;
        info!(session = %state.session_id, question = %state.question, "Query received");
    }

    pub(super) async fn interpret(&self, state: &mut OrchestrationState) {
        let model = state.overrides.resolve(ModelRole::Router, &self.models_config);
        let system = prompts::classifier_system(state.reference_date);
        let prompt = prompts::single_turn(prompts::classifier_user(&state.question), model.style);

        let classification = match self.timed_answer(state, &model, &system, &prompt, true).await {
            Ok(reply) => parse_classification(&reply),
            Err(e) => {
                warn!(model = %model.name, error = %e, "Classifier call failed");
                Classification::fallback(format!("Classifier unavailable: {e}"))
            }
        };

        state.intent = classification.intent;
        state.classification_detail = classification.detail;
        info!(
            intent = %state.intent,
            model = %model.name,
            total_secs = state.total_processing.as_secs_f64(),
            "Intent classified"
        );
    }

    pub(super) async fn retrieve_memory(&self, state: &mut OrchestrationState) {
        let request = match &state.intent {
            Intent::Temporal {
                start: Some(start),
                end: Some(end),
            } => RetrievalRequest::temporal(start, end),
            Intent::MostRecent => RetrievalRequest::most_recent(),
            _ => RetrievalRequest::semantic(&state.question),
        };

        state.memory_indices = match self.retriever.retrieve(&request).await {
            Ok(indices) => indices,
            Err(e) => {
                warn!(error = %e, "Memory retrieval failed, answering without context");
                Vec::new()
            }
        };
        info!(mode = ?request.mode, blocks = state.memory_indices.len(), "Memory retrieved");
    }

    pub(super) async fn generate_with_memory(&self, state: &mut OrchestrationState) {
        let model = state.overrides.resolve(ModelRole::Memory, &self.models_config);

        let history = {
            let store = self.conversations.lock().await;
            store
                .recent(&state.session_id, self.config.history_turns)
                .to_vec()
        };
        let prompt = prompts::chat_prompt(&history, &state.question, model.style);

        let blocks = self.retriever.blocks_by_indices(&state.memory_indices).await;
        let context = (!blocks.is_empty())
            .then(|| prompts::memory_context(&blocks, self.config.memory_snippet_chars));
        let system = prompts::memory_system(context.as_deref());

        let result = self.timed_answer(state, &model, &system, &prompt, false).await;
        finish_answer(state, &model, result, "");
    }

    pub(super) async fn interpret_code(&self, state: &mut OrchestrationState) {
        let summary = match &self.code {
            Some(code) => code.latest_summary().await.unwrap_or_else(|e| {
                warn!(error = %e, "Could not load code summary");
                None
            }),
            None => None,
        };

        let Some(summary) = summary else {
            info!("No code summary available, declining");
            state.answer = prompts::CODE_APOLOGY.to_string();
            return;
        };

        let model = state.overrides.resolve(ModelRole::Code, &self.models_config);
        let prompt = prompts::single_turn(prompts::code_user(&state.question, &summary), model.style);
        let result = self
            .timed_answer(state, &model, prompts::CODE_SYSTEM, &prompt, false)
            .await;
        finish_answer(state, &model, result, "");
    }

    pub(super) async fn direct_answer(&self, state: &mut OrchestrationState) {
        let model = state.overrides.resolve(ModelRole::Fallback, &self.models_config);
        let prompt = prompts::single_turn(state.question.clone(), model.style);
        let result = self
            .timed_answer(state, &model, prompts::DIRECT_SYSTEM, &prompt, false)
            .await;
        finish_answer(state, &model, result, "");
    }

    pub(super) async fn execute_tool(&self, state: &mut OrchestrationState) {
        state.tool_attempts += 1;
        if state.tool_attempts > self.config.max_tool_attempts {
            warn!(attempts = state.tool_attempts, "Tool attempts exhausted, giving up");
            state.answer = prompts::TOOL_GIVE_UP.to_string();
            state.failure_detail = None;
            return;
        }
        info!(attempt = state.tool_attempts, question = %state.question, "Executing tool");

        let started = Instant::now();
        let result = if state.question.is_empty() {
            Err(SDKError::tool("no question received for tool execution"))
        } else {
            self.tools.run(&state.question).await.and_then(check_tool_output)
        };
        state.add_processing(started.elapsed());

        match result {
            Ok(output) => {
                state.answer = output;
                state.failure_detail = None;
            }
            Err(e) => {
                warn!(attempt = state.tool_attempts, error = %e, "Tool execution failed");
                state.answer.clear();
                state.failure_detail = Some(format!("{TOOL_FAILURE_MARKER} a ferramenta: {e}"));
            }
        }
    }

    pub(super) async fn analyze_failure(&self, state: &mut OrchestrationState) {
        let model = state.overrides.resolve(ModelRole::Fallback, &self.models_config);
        let detail = state.failure_detail.clone().unwrap_or_default();
        let prompt = prompts::single_turn(
            prompts::failure_user(&state.question, &detail),
            model.style,
        );
        let result = self
            .timed_answer(state, &model, prompts::FAILURE_SYSTEM, &prompt, false)
            .await;
        finish_answer(state, &model, result, " (failure analysis)");
    }

    pub(super) async fn persist_turn(&self, state: &OrchestrationState) {
        if state.question.is_empty()
            || state.answer.is_empty()
            || state.answer_failed
            || state.answer.contains(MODEL_ERROR_PREFIX)
        {
            debug!("Nothing to persist for this query");
            return;
        }

        let turn = ConversationTurn::new(&state.question, strip_annotation(&state.answer));
        let mut store = self.conversations.lock().await;
        match store.append(&state.session_id, turn) {
            Ok(()) => debug!(session = %state.session_id, "Turn saved"),
            Err(e) => warn!(session = %state.session_id, error = %e, "Could not save turn"),
        }
    }

    pub(super) fn finalize(&self, state: &OrchestrationState, started_at: String) {
        let Some(log) = &self.trace else {
            return;
        };

        let mut records = state.trace.clone();
        records.push(TraceRecord {
            node: "finalize".to_string(),
            started_at,
            finished_at: now_iso(),
            question: None,
            outcome: Some(truncate_chars(&state.answer, TRACE_TEXT_CHARS).to_string()),
        });
        if let Err(e) = log.append(&records) {
            warn!(error = %e, "Could not write execution trace");
        }
    }

    /// Call a model and account its latency; failed calls count as zero.
    async fn timed_answer(
        &self,
        state: &mut OrchestrationState,
        model: &ModelRef,
        system: &str,
        prompt: &Prompt,
        json_mode: bool,
    ) -> SDKResult<String> {
        let started = Instant::now();
        let result = self.models.answer(model, system, prompt, json_mode).await;
        match &result {
            Ok(_) => state.add_processing(started.elapsed()),
            Err(_) => state.add_processing(std::time::Duration::ZERO),
        }
        result
    }
}

/// Store a model result as the visible answer.
fn finish_answer(
    state: &mut OrchestrationState,
    model: &ModelRef,
    result: SDKResult<String>,
    label: &str,
) {
    match result {
        Ok(text) => {
            state.answer = format!(
                "{text}{ANNOTATION_MARKER}{label}: {} | Total time: {:.2}s*",
                model.name,
                state.total_processing.as_secs_f64()
            );
            state.answer_failed = false;
        }
        Err(e) => {
            warn!(model = %model.name, error = %e, "Model call failed");
            state.answer = format!("{MODEL_ERROR_PREFIX}: {e}");
            state.answer_failed = true;
        }
    }
}

fn check_tool_output(output: String) -> SDKResult<String> {
    let lower = output.to_lowercase();
    if TOOL_ERROR_FRAGMENTS.iter().any(|f| lower.contains(f)) {
        return Err(SDKError::tool(format!(
            "the tool returned an error message: {output}"
        )));
    }
    Ok(output)
}

/// Answer text without the trailing model/time annotation.
pub(crate) fn strip_annotation(answer: &str) -> &str {
    answer
        .split(ANNOTATION_MARKER)
        .next()
        .unwrap_or(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tempfile::TempDir;
    use tokio::sync::{Mutex, RwLock};

    use nexus_core::trace::TraceLog;
    use nexus_core::{ActivityRecord, ConversationStore, IndexedMemory, VectorIndex};

    use crate::code_context::CodeContext;
    use crate::config::{MemoryConfig, ModelsConfig, OrchestratorConfig};
    use crate::memory::{Embedder, HashingEmbedder, MemoryRetriever, SharedIndex};
    use crate::models::{ModelClient, PromptStyle};
    use crate::orchestrator::{Node, QueryRequest};
    use crate::tools::ToolAgent;

    const DIM: usize = 16;

    type Script = Box<dyn Fn(&str, &Prompt) -> SDKResult<String> + Send + Sync>;

    #[derive(Debug, Clone)]
    struct Call {
        model: String,
        system: String,
        prompt: Prompt,
    }

    #[derive(Default)]
    struct ScriptedModel {
        scripts: HashMap<String, Script>,
        calls: StdMutex<Vec<Call>>,
    }

    impl ScriptedModel {
        fn on(
            mut self,
            model: &str,
            script: impl Fn(&str, &Prompt) -> SDKResult<String> + Send + Sync + 'static,
        ) -> Self {
            self.scripts.insert(model.to_string(), Box::new(script));
            self
        }

        fn reply(self, model: &str, text: &'static str) -> Self {
            self.on(model, move |_, _| Ok(text.to_string()))
        }

        fn calls_to(&self, model: &str) -> Vec<Call> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.model == model)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn answer(
            &self,
            model: &ModelRef,
            system: &str,
            prompt: &Prompt,
            _json_mode: bool,
        ) -> SDKResult<String> {
            self.calls.lock().unwrap().push(Call {
                model: model.name.clone(),
                system: system.to_string(),
                prompt: prompt.clone(),
            });
            match self.scripts.get(&model.name) {
                Some(script) => script(system, prompt),
                None => Err(SDKError::model(format!("{} is offline", model.name))),
            }
        }
    }

    struct CountingTool {
        calls: AtomicUsize,
        output: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl ToolAgent for CountingTool {
        async fn run(&self, _request: &str) -> SDKResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output
                .map(String::from)
                .map_err(SDKError::tool)
        }
    }

    struct FixedCode(&'static str);

    #[async_trait]
    impl CodeContext for FixedCode {
        async fn latest_summary(&self) -> SDKResult<Option<String>> {
            Ok(Some(self.0.to_string()))
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        model: Arc<ScriptedModel>,
        tool: Arc<CountingTool>,
        index: SharedIndex,
        dir: TempDir,
    }

    fn models_config() -> ModelsConfig {
        ModelsConfig {
            router: ModelRef::new("router"),
            memory: ModelRef::new("memory"),
            code: ModelRef::new("coder"),
            fallback: ModelRef::new("gpt-test"),
            ..Default::default()
        }
    }

    fn fixture(model: ScriptedModel, tool_output: Result<&'static str, &'static str>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let memory = MemoryConfig {
            embedding_dim: DIM,
            ..Default::default()
        };
        let index: SharedIndex = Arc::new(RwLock::new(VectorIndex::new(DIM)));
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(DIM));
        let retriever = MemoryRetriever::new(Arc::clone(&index), embedder, &memory);
        let conversations = Arc::new(Mutex::new(ConversationStore::load(
            dir.path().join("turns.json"),
            dir.path().join("sessions.json"),
            10,
        )));

        let model = Arc::new(model);
        let tool = Arc::new(CountingTool {
            calls: AtomicUsize::new(0),
            output: tool_output,
        });
        let orchestrator = Orchestrator::new(
            OrchestratorConfig::default(),
            models_config(),
            model.clone(),
            retriever,
            conversations,
            tool.clone(),
        )
        .with_trace(TraceLog::new(dir.path().join("trace.json")));

        Fixture {
            orchestrator,
            model,
            tool,
            index,
            dir,
        }
    }

    async fn index_activity(index: &SharedIndex, ts: &str, window: &str) {
        let entry: IndexedMemory = ActivityRecord::new(window, "")
            .at(ts)
            .with_summary(format!("using {window}"))
            .into();
        let vector = HashingEmbedder::new(DIM).embed(window).await.unwrap();
        index.write().await.add(&vector, entry).unwrap();
    }

    async fn turns(f: &Fixture, session: &str) -> Vec<ConversationTurn> {
        f.orchestrator
            .conversations()
            .lock()
            .await
            .turns(session)
            .to_vec()
    }

    #[tokio::test]
    async fn test_yesterday_resolves_to_previous_day() {
        let model = ScriptedModel::default()
            .on("router", |system, _| {
                if system.contains(r#""inicio": "2024-03-09T00:00:00", "fim": "2024-03-09T23:59:59""#) {
                    Ok(r#"{"tipo": "temporal", "inicio": "2024-03-09T00:00:00", "fim": "2024-03-09T23:59:59"}"#.into())
                } else {
                    Ok(r#"{"tipo": "semantica"}"#.into())
                }
            })
            .reply("memory", "You mostly coded.");
        let f = fixture(model, Ok("unused"));
        index_activity(&f.index, "2024-03-08T18:00:00", "Slack").await;
        index_activity(&f.index, "2024-03-09T09:00:00", "Editor").await;
        index_activity(&f.index, "2024-03-09T15:30:00", "Terminal").await;
        index_activity(&f.index, "2024-03-10T08:00:00", "Browser").await;

        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let state = f
            .orchestrator
            .handle(QueryRequest::new("  o que eu fiz ontem?  ").with_reference_date(date))
            .await;

        assert_eq!(state.question, "o que eu fiz ontem?");
        assert_eq!(
            state.intent,
            Intent::Temporal {
                start: Some("2024-03-09T00:00:00".into()),
                end: Some("2024-03-09T23:59:59".into()),
            }
        );
        assert_eq!(state.memory_indices, vec![1, 2]);
        assert_eq!(
            state.path,
            vec![
                Node::ProcessQuery,
                Node::Interpret,
                Node::RetrieveMemory,
                Node::GenerateWithMemory,
                Node::PersistTurn,
                Node::Finalize
            ]
        );

        let memory_calls = f.model.calls_to("memory");
        assert_eq!(memory_calls.len(), 1);
        assert!(memory_calls[0].system.contains("1. [2024-03-09T09:00:00] using Editor (Window: Editor)"));
        assert!(memory_calls[0].system.contains("2. [2024-03-09T15:30:00]"));
        assert!(!memory_calls[0].system.contains("Slack"));

        assert!(state.answer.starts_with("You mostly coded."));
        assert!(state.answer.contains("*Model: memory | Total time:"));
    }

    #[tokio::test]
    async fn test_malformed_classification_reaches_direct_answer() {
        let model = ScriptedModel::default()
            .reply("router", "Sure! This looks like a semantic question.")
            .reply("gpt-test", "Hello there.");
        let f = fixture(model, Ok("unused"));

        let state = f.orchestrator.handle(QueryRequest::new("hi")).await;

        assert_eq!(state.intent, Intent::Fallback);
        assert!(state.classification_detail.is_some());
        assert!(state.path.contains(&Node::DirectAnswer));
        assert_eq!(state.path.last(), Some(&Node::Finalize));

        let direct = f.model.calls_to("gpt-test");
        assert_eq!(direct.len(), 1);
        assert!(matches!(direct[0].prompt, Prompt::Messages(_)));
    }

    #[tokio::test]
    async fn test_tool_gives_up_after_two_failures() {
        let model = ScriptedModel::default()
            .reply("router", r#"{"tipo": "tools"}"#)
            .reply("gpt-test", "The folder could not be found. Try an absolute path.");
        let f = fixture(model, Ok("Diretório não encontrado"));

        let first = f.orchestrator.handle(QueryRequest::new("list my folder")).await;
        assert_eq!(first.tool_attempts, 1);
        assert!(first.failure_detail.as_deref().unwrap().contains(TOOL_FAILURE_MARKER));
        assert!(first.path.contains(&Node::AnalyzeFailure));
        assert!(first.answer.contains("(failure analysis)"));

        let second = f.orchestrator.retry(first).await;
        assert_eq!(second.tool_attempts, 2);
        assert_eq!(
            second.path,
            vec![Node::ExecuteTool, Node::AnalyzeFailure, Node::PersistTurn, Node::Finalize]
        );

        let third = f.orchestrator.retry(second).await;
        assert_eq!(third.tool_attempts, 3);
        assert_eq!(third.answer, prompts::TOOL_GIVE_UP);
        assert_eq!(third.path, vec![Node::ExecuteTool, Node::PersistTurn, Node::Finalize]);
        assert_eq!(f.tool.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_ignores_states_without_failed_tool() {
        let model = ScriptedModel::default()
            .reply("router", r#"{"tipo": "fallback"}"#)
            .reply("gpt-test", "Hello there.");
        let f = fixture(model, Ok("a.txt"));

        let direct = f.orchestrator.handle(QueryRequest::new("hi")).await;
        let path = direct.path.clone();
        let retried = f.orchestrator.retry(direct).await;
        assert_eq!(retried.path, path);
        assert_eq!(retried.tool_attempts, 0);
        assert!(retried.answer.starts_with("Hello there."));
        assert_eq!(f.tool.calls.load(Ordering::SeqCst), 0);

        let f = fixture(
            ScriptedModel::default().reply("router", r#"{"tipo": "tools"}"#),
            Ok("a.txt"),
        );
        let listed = f.orchestrator.handle(QueryRequest::new("list /tmp")).await;
        let retried = f.orchestrator.retry(listed).await;
        assert_eq!(retried.tool_attempts, 1);
        assert_eq!(retried.answer, "a.txt");
        assert_eq!(f.tool.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tool_exception_routes_to_failure_analysis() {
        let model = ScriptedModel::default()
            .reply("router", r#"{"tipo": "tools"}"#)
            .reply("gpt-test", "Permission was denied.");
        let f = fixture(model, Err("permission denied"));

        let state = f.orchestrator.handle(QueryRequest::new("read /root/secret")).await;
        assert!(state.path.contains(&Node::AnalyzeFailure));
        let analysis = f.model.calls_to("gpt-test");
        assert!(analysis[0].prompt.to_text().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_tool_success_is_persisted() {
        let model = ScriptedModel::default().reply("router", r#"{"tipo": "tools"}"#);
        let f = fixture(model, Ok("a.txt\nb.txt"));

        let state = f.orchestrator.handle(QueryRequest::new("list /tmp").in_session("s1")).await;
        assert_eq!(state.answer, "a.txt\nb.txt");
        assert!(state.failure_detail.is_none());
        assert!(!state.path.contains(&Node::AnalyzeFailure));
        assert_eq!(turns(&f, "s1").await[0].answer, "a.txt\nb.txt");
    }

    #[tokio::test]
    async fn test_model_failure_becomes_answer_and_is_not_persisted() {
        // no script for the fallback model: every call to it fails
        let model = ScriptedModel::default().reply("router", r#"{"tipo": "fallback"}"#);
        let f = fixture(model, Ok("unused"));

        let state = f.orchestrator.handle(QueryRequest::new("hello")).await;
        assert!(state.answer.starts_with(MODEL_ERROR_PREFIX));
        assert!(state.answer_failed);
        assert_eq!(state.path.last(), Some(&Node::Finalize));
        assert!(turns(&f, "default").await.is_empty());

        let trace = TraceLog::new(f.dir.path().join("trace.json")).read().unwrap();
        let nodes: Vec<&str> = trace.iter().map(|r| r.node.as_str()).collect();
        assert_eq!(
            nodes,
            vec!["process_query", "interpret", "direct_answer", "persist_turn", "finalize"]
        );
        assert_eq!(trace[0].question.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_classifier_failure_falls_back() {
        let model = ScriptedModel::default().reply("gpt-test", "Hi!");
        let f = fixture(model, Ok("unused"));

        let state = f.orchestrator.handle(QueryRequest::new("hello")).await;
        assert_eq!(state.intent, Intent::Fallback);
        assert!(state.classification_detail.unwrap().contains("offline"));
        assert!(state.answer.starts_with("Hi!"));
    }

    #[tokio::test]
    async fn test_code_without_summary_apologizes() {
        let model = ScriptedModel::default()
            .reply("router", r#"{"tipo": "codigo"}"#)
            .reply("coder", "should not be called");
        let f = fixture(model, Ok("unused"));

        let state = f.orchestrator.handle(QueryRequest::new("why does main panic?")).await;
        assert_eq!(state.answer, prompts::CODE_APOLOGY);
        assert!(f.model.calls_to("coder").is_empty());
    }

    #[tokio::test]
    async fn test_code_with_summary_grounds_model() {
        let model = ScriptedModel::default()
            .reply("router", r#"{"tipo": "codigo"}"#)
            .reply("coder", "The unwrap on line 3 panics.");
        let f = fixture(model, Ok("unused"));
        let orchestrator = f
            .orchestrator
            .with_code_context(Arc::new(FixedCode("fn main() { None::<u8>.unwrap(); }")));

        let state = orchestrator.handle(QueryRequest::new("why does main panic?")).await;
        assert!(state.answer.starts_with("The unwrap on line 3 panics."));

        let calls = f.model.calls_to("coder");
        assert_eq!(calls[0].system, prompts::CODE_SYSTEM);
        assert!(calls[0].prompt.to_text().contains("<code_summary>\nfn main()"));
    }

    #[tokio::test]
    async fn test_history_capped_and_annotation_stripped() {
        let model = ScriptedModel::default()
            .reply("router", r#"{"tipo": "semantica"}"#)
            .reply("memory", "Noted.");
        let f = fixture(model, Ok("unused"));

        for i in 0..12 {
            f.orchestrator
                .handle(QueryRequest::new(format!("question {i}")).in_session("chat"))
                .await;
        }

        let stored = turns(&f, "chat").await;
        assert_eq!(stored.len(), 10);
        assert_eq!(stored[0].question, "question 2");
        assert!(stored.iter().all(|t| t.answer == "Noted."));

        // flattened history: last 8 turns then an open assistant turn
        let last = f.model.calls_to("memory").pop().unwrap();
        let Prompt::Text(text) = last.prompt else {
            panic!("memory model uses flattened prompts");
        };
        assert!(text.ends_with("User: question 11\nAssistant:"));
        assert!(text.contains("User: question 3\n"));
        assert!(!text.contains("User: question 2\n"));
        assert!(last.system.contains("No recent activity data"));
    }

    #[tokio::test]
    async fn test_overrides_pick_model_and_style() {
        let model = ScriptedModel::default()
            .reply("router", r#"{"tipo": "mais_recente"}"#)
            .reply("local-chat", "Latest was the terminal.");
        let f = fixture(model, Ok("unused"));
        index_activity(&f.index, "2024-03-09T09:00:00", "Editor").await;
        index_activity(&f.index, "2024-03-09T10:00:00", "Terminal").await;

        let overrides = crate::models::ModelOverrides {
            memory: Some(ModelRef::new("local-chat").with_style(PromptStyle::Chat)),
            ..Default::default()
        };
        let state = f
            .orchestrator
            .handle(QueryRequest::new("what did I do last?").with_overrides(overrides))
            .await;

        assert_eq!(state.memory_indices, vec![1]);
        assert!(state.answer.contains("*Model: local-chat"));
        let calls = f.model.calls_to("local-chat");
        assert!(matches!(calls[0].prompt, Prompt::Messages(_)));
    }

    #[test]
    fn test_strip_annotation() {
        assert_eq!(strip_annotation("Done.\n\n*Model: x | Total time: 1.00s*"), "Done.");
        assert_eq!(strip_annotation("plain"), "plain");
    }

    #[test]
    fn test_check_tool_output() {
        assert!(check_tool_output("ERROR: nope".into()).is_err());
        assert!(check_tool_output("Arquivo não encontrado".into()).is_err());
        assert!(check_tool_output("all good".into()).is_ok());
    }
}
