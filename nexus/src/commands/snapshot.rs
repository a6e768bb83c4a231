//! Code snapshot command.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use nexus_sdk::CodeSnapshotStore;

use crate::config::Config;

/// Execute snapshot command.
pub fn execute(path: Option<&Path>, config: &Config) -> Result<()> {
    let project = match path {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    let store = CodeSnapshotStore::new(config.sdk_config().paths().code_versions());
    let written = store
        .snapshot(&project)
        .with_context(|| format!("Failed to snapshot {}", project.display()))?;

    println!("{} Snapshot of {}", "✓".green(), project.display());
    println!("  {}", written.display());
    Ok(())
}
