//! Interactive conversation loop.

use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use nexus_sdk::{Nexus, OrchestrationState, QueryRequest};

use super::ask::print_answer;
use super::{open_nexus, overrides};
use crate::cli::ChatArgs;
use crate::config::Config;

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "sair"];

/// Execute chat command.
pub async fn execute(args: ChatArgs, config: &Config) -> Result<()> {
    let nexus = open_nexus(config).await?;
    let session = args.session.unwrap_or_else(Nexus::new_session_id);
    let overrides = overrides(&args.models);

    println!("{} {}", "Session".cyan(), session);
    println!("{}", "Type 'exit' to leave.".dimmed());

    loop {
        let question: String = Input::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()?;
        let question = question.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question.to_lowercase().as_str()) {
            break;
        }

        let request = QueryRequest::new(question)
            .in_session(&session)
            .with_overrides(overrides.clone());
        let mut state = with_spinner(nexus.ask(request)).await;

        while state.tool_failed() {
            print_answer(&state);
            let again = Confirm::new()
                .with_prompt("The tool failed. Try again?")
                .default(true)
                .interact()?;
            if !again {
                break;
            }
            state = with_spinner(nexus.retry(state)).await;
        }
        if !state.tool_failed() {
            print_answer(&state);
        }
    }

    Ok(())
}

async fn with_spinner(
    query: impl std::future::Future<Output = OrchestrationState>,
) -> OrchestrationState {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let state = query.await;
    spinner.finish_and_clear();
    state
}
