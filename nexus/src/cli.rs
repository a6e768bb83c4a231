//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Nexus - ask questions about your own computer activity
#[derive(Parser, Debug)]
#[command(name = "nexus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to ~/.config/nexus/config.toml)
    #[arg(long, global = true, env = "NEXUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory override
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask one question
    Ask(AskArgs),

    /// Interactive conversation
    Chat(ChatArgs),

    /// Read JSON-lines activity records from stdin on the observation interval
    Observe {
        /// Seconds between observations (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Feed a JSON-lines file of activity records through the memory pipeline
    Ingest {
        /// File with one activity record per line
        file: PathBuf,
    },

    /// Inspect and search memory
    Memory(MemoryCommand),

    /// Conversation sessions (list, show, delete)
    Sessions(SessionsCommand),

    /// Write a code snapshot used to answer code questions
    Snapshot {
        /// Project directory (defaults to the current directory)
        path: Option<PathBuf>,
    },

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Query Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Model selection shared by `ask` and `chat`
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// Use this model for every role
    #[arg(long)]
    pub model: Option<String>,

    /// Intent classifier model
    #[arg(long)]
    pub router_model: Option<String>,

    /// Model answering from memory
    #[arg(long)]
    pub memory_model: Option<String>,

    /// Model answering code questions
    #[arg(long)]
    pub code_model: Option<String>,

    /// Model for direct answers and failure analysis
    #[arg(long)]
    pub fallback_model: Option<String>,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,

    /// Session to read history from and append to
    #[arg(short, long)]
    pub session: Option<String>,

    /// Resolve relative dates against this day (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<chrono::NaiveDate>,

    /// Retry failed tool runs until the attempt limit
    #[arg(long)]
    pub retry: bool,

    /// Output the full state as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub models: ModelArgs,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Session to continue (a new one is created when omitted)
    #[arg(short, long)]
    pub session: Option<String>,

    #[command(flatten)]
    pub models: ModelArgs,
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct MemoryCommand {
    #[command(subcommand)]
    pub action: MemoryAction,
}

#[derive(Subcommand, Debug)]
pub enum MemoryAction {
    /// Show tier sizes
    Stats,

    /// Look up memory entries
    Search {
        /// Free-text query (semantic lookup)
        query: Option<String>,

        /// Start of a time range (ISO-8601)
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// End of a time range (ISO-8601)
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Return only the most recent entry
        #[arg(long, conflicts_with_all = ["from", "query"])]
        latest: bool,

        /// Maximum results for semantic lookups
        #[arg(short, long)]
        k: Option<usize>,

        /// Level preference, e.g. "curto>medio>longo"
        #[arg(long)]
        prefer: Option<String>,

        /// Field filter as key=substring (repeatable)
        #[arg(short, long)]
        filter: Vec<String>,
    },

    /// Re-embed every indexed entry
    Rebuild,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct SessionsCommand {
    #[command(subcommand)]
    pub action: SessionsAction,
}

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// List sessions, newest first
    List,

    /// Show the turns of a session
    Show {
        /// Session ID
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session ID
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_joins_words() {
        let cli = Cli::parse_from(["nexus", "ask", "what", "did", "I", "do?", "--date", "2024-03-10"]);
        let Commands::Ask(args) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.question.join(" "), "what did I do?");
        assert_eq!(args.date, chrono::NaiveDate::from_ymd_opt(2024, 3, 10));
    }

    #[test]
    fn test_search_range_requires_both_bounds() {
        let result = Cli::try_parse_from(["nexus", "memory", "search", "--from", "2024-03-09T00:00:00"]);
        assert!(result.is_err());
    }
}
