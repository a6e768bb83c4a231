//! nexus - Personal activity memory CLI
//!
//! Records what happens on the machine, compacts it into tiered memory and
//! answers questions about it.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let directive = if cli.verbose { "nexus=debug" } else { "nexus=info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    // Load configuration
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.paths.data_dir = data_dir;
    }

    // Execute command
    match cli.command {
        Commands::Ask(args) => commands::ask::execute(args, &config).await,
        Commands::Chat(args) => commands::chat::execute(args, &config).await,
        Commands::Observe { interval } => commands::observe::observe(interval, &config).await,
        Commands::Ingest { file } => commands::observe::ingest(&file, &config).await,
        Commands::Memory(cmd) => commands::memory::execute(cmd, &config).await,
        Commands::Sessions(cmd) => commands::sessions::execute(cmd, &config),
        Commands::Snapshot { path } => commands::snapshot::execute(path.as_deref(), &config),
        Commands::Version => {
            println!("nexus {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
