//! Per-session conversation history.
//!
//! Turns are kept in memory keyed by session id and written back as one JSON
//! object (`turns.json`) plus a session index (`sessions.json`) after each
//! mutation. The store is an explicit value owned by its caller; there is no
//! process-wide instance.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::storage::{load_json_or_default, save_json};
use crate::util::{now_iso_seconds, truncate_chars};

/// Session used when a query does not name one.
pub const DEFAULT_SESSION: &str = "default";

/// Turns kept per session.
pub const DEFAULT_MAX_TURNS: usize = 10;

const TITLE_CHARS: usize = 60;

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub timestamp: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            timestamp: now_iso_seconds(),
        }
    }
}

/// Entry of the session index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub updated_at: String,
    pub turn_count: usize,
}

/// Multi-session turn store.
#[derive(Debug)]
pub struct ConversationStore {
    sessions: BTreeMap<String, Vec<ConversationTurn>>,
    turns_path: Option<PathBuf>,
    index_path: Option<PathBuf>,
    max_turns: usize,
}

impl ConversationStore {
    /// Create a store that is never written to disk
    pub fn in_memory(max_turns: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            turns_path: None,
            index_path: None,
            max_turns,
        }
    }

    /// Load the store from disk.
    ///
    /// A missing file starts empty; an unreadable one is logged and also starts
    /// empty so a damaged history never blocks queries.
    pub fn load(turns_path: PathBuf, index_path: PathBuf, max_turns: usize) -> Self {
        let sessions = match load_json_or_default::<BTreeMap<String, Vec<ConversationTurn>>>(
            &turns_path,
        ) {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(path = %turns_path.display(), error = %e, "Could not read conversation history, starting empty");
                BTreeMap::new()
            }
        };
        debug!(sessions = sessions.len(), "Loaded conversation history");

        Self {
            sessions,
            turns_path: Some(turns_path),
            index_path: Some(index_path),
            max_turns,
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// All stored turns of a session, oldest first
    pub fn turns(&self, session_id: &str) -> &[ConversationTurn] {
        self.sessions
            .get(session_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The last `n` turns of a session, oldest first
    pub fn recent(&self, session_id: &str, n: usize) -> &[ConversationTurn] {
        let turns = self.turns(session_id);
        &turns[turns.len().saturating_sub(n)..]
    }

    /// Append a turn, keep the newest `max_turns`, and persist.
    ///
    /// The store is unchanged when the write fails.
    pub fn append(&mut self, session_id: &str, turn: ConversationTurn) -> Result<()> {
        let mut sessions = self.sessions.clone();
        let turns = sessions.entry(session_id.to_string()).or_default();
        turns.push(turn);
        if turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(..excess);
        }
        self.write(&sessions)?;
        self.sessions = sessions;
        Ok(())
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete_session(&mut self, session_id: &str) -> Result<bool> {
        if !self.sessions.contains_key(session_id) {
            return Ok(false);
        }
        let mut sessions = self.sessions.clone();
        sessions.remove(session_id);
        self.write(&sessions)?;
        self.sessions = sessions;
        Ok(true)
    }

    pub fn session_ids(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    /// Session index, most recently updated first
    pub fn summaries(&self) -> Vec<SessionSummary> {
        summarize(&self.sessions)
    }

    /// Write turns and the session index
    fn write(&self, sessions: &BTreeMap<String, Vec<ConversationTurn>>) -> Result<()> {
        if let Some(path) = &self.turns_path {
            save_json(path, sessions)?;
        }
        if let Some(path) = &self.index_path {
            save_json(path, &summarize(sessions))?;
        }
        Ok(())
    }
}

fn summarize(sessions: &BTreeMap<String, Vec<ConversationTurn>>) -> Vec<SessionSummary> {
    let mut summaries: Vec<SessionSummary> = sessions
        .iter()
        .map(|(id, turns)| SessionSummary {
            id: id.clone(),
            title: turns
                .first()
                .map(|t| truncate_chars(&t.question, TITLE_CHARS).to_string())
                .unwrap_or_default(),
            updated_at: turns.last().map(|t| t.timestamp.clone()).unwrap_or_default(),
            turn_count: turns.len(),
        })
        .collect();
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    summaries
}
