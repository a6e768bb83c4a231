//! Conversation session commands.
//!
//! Reads the turn store directly; no models or embeddings are loaded.

use anyhow::{Context, Result, bail};
use colored::Colorize;

use nexus_core::ConversationStore;

use crate::cli::{SessionsAction, SessionsCommand};
use crate::config::Config;

/// Execute sessions command.
pub fn execute(cmd: SessionsCommand, config: &Config) -> Result<()> {
    let paths = config.sdk_config().paths();
    let mut store = ConversationStore::load(
        paths.turns(),
        paths.sessions(),
        config.orchestrator.stored_turns,
    );

    match cmd.action {
        SessionsAction::List => list(&store),
        SessionsAction::Show { id } => show(&store, &id),
        SessionsAction::Delete { id } => {
            if !store.delete_session(&id).context("Failed to delete session")? {
                bail!("Session not found: {}", id);
            }
            println!("{} Deleted session {}", "✓".green(), id);
            Ok(())
        }
    }
}

fn list(store: &ConversationStore) -> Result<()> {
    let summaries = store.summaries();
    if summaries.is_empty() {
        println!("{}", "No sessions".dimmed());
        return Ok(());
    }

    for summary in summaries {
        println!(
            "{}  {}  {} ({} turns)",
            summary.id.cyan(),
            summary.updated_at.dimmed(),
            summary.title,
            summary.turn_count
        );
    }
    Ok(())
}

fn show(store: &ConversationStore, id: &str) -> Result<()> {
    let turns = store.turns(id);
    if turns.is_empty() {
        bail!("Session not found: {}", id);
    }

    for turn in turns {
        println!("{} {}", turn.timestamp.dimmed(), "you".bold());
        println!("  {}", turn.question);
        println!("{}", "nexus".bold());
        println!("  {}", turn.answer.replace('\n', "\n  "));
        println!();
    }
    Ok(())
}
