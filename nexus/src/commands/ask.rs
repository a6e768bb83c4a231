//! One-shot question.

use anyhow::Result;
use colored::Colorize;
use nexus_sdk::{OrchestrationState, QueryRequest};
use tracing::debug;

use super::{open_nexus, overrides};
use crate::cli::AskArgs;
use crate::config::Config;

/// Execute ask command.
pub async fn execute(args: AskArgs, config: &Config) -> Result<()> {
    let nexus = open_nexus(config).await?;

    let mut request = QueryRequest::new(args.question.join(" "))
        .with_overrides(overrides(&args.models));
    if let Some(session) = args.session {
        request = request.in_session(session);
    }
    if let Some(date) = args.date {
        request = request.with_reference_date(date);
    }

    let mut state = nexus.ask(request).await;
    while args.retry && state.tool_failed() {
        debug!(attempts = state.tool_attempts, "Retrying tool");
        state = nexus.retry(state).await;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state_json(&state))?);
    } else {
        print_answer(&state);
    }
    Ok(())
}

/// Print the answer with a short footer.
pub(crate) fn print_answer(state: &OrchestrationState) {
    if state.answer_failed {
        println!("{}", state.answer.red());
    } else {
        println!("{}", state.answer);
    }
    println!(
        "{}",
        format!("[{} | session {}]", state.intent, state.session_id).dimmed()
    );
}

fn state_json(state: &OrchestrationState) -> serde_json::Value {
    serde_json::json!({
        "question": state.question,
        "session_id": state.session_id,
        "intent": state.intent.as_str(),
        "classification_detail": state.classification_detail,
        "memory_indices": state.memory_indices,
        "answer": state.answer,
        "answer_failed": state.answer_failed,
        "tool_attempts": state.tool_attempts,
        "failure_detail": state.failure_detail,
        "total_secs": state.total_processing.as_secs_f64(),
        "path": state.path.iter().map(|n| n.as_str()).collect::<Vec<_>>(),
    })
}
