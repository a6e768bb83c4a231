//! Memory inspection commands.

use anyhow::{Context, Result, bail};
use colored::Colorize;

use nexus_core::util::truncate_chars;
use nexus_core::{IndexedMemory, MemoryLevel};
use nexus_sdk::{MemoryRetriever, RetrievalRequest};

use super::open_nexus;
use crate::cli::{MemoryAction, MemoryCommand};
use crate::config::Config;

/// Execute memory command.
pub async fn execute(cmd: MemoryCommand, config: &Config) -> Result<()> {
    match cmd.action {
        MemoryAction::Stats => stats(config).await,
        MemoryAction::Search {
            query,
            from,
            to,
            latest,
            k,
            prefer,
            filter,
        } => {
            let mut request = match (query, from, to, latest) {
                (_, _, _, true) => RetrievalRequest::most_recent(),
                (_, Some(from), Some(to), false) => RetrievalRequest::temporal(from, to),
                (Some(query), None, None, false) => RetrievalRequest::semantic(query),
                _ => bail!("Give a query, a --from/--to range, or --latest"),
            };
            if let Some(k) = k {
                request = request.with_k(k);
            }
            if let Some(chain) = prefer {
                request = request.with_preference(MemoryLevel::parse_preference(&chain));
            }
            for (key, value) in parse_filters(&filter)? {
                request = request.with_filter(key, value);
            }
            search(&request, config).await
        }
        MemoryAction::Rebuild => rebuild(config).await,
    }
}

async fn stats(config: &Config) -> Result<()> {
    let nexus = open_nexus(config).await?;
    let stats = nexus.pipeline().stats().await;

    println!("{}", "Memory".bold());
    println!("  {:<10} {}", "curto".cyan(), stats.raw);
    println!("  {:<10} {}", "medio".cyan(), stats.medium);
    println!("  {:<10} {}", "longo".cyan(), stats.long);
    println!("  {:<10} {}", "indexed".cyan(), stats.indexed);
    Ok(())
}

async fn search(request: &RetrievalRequest, config: &Config) -> Result<()> {
    let nexus = open_nexus(config).await?;
    let pipeline = nexus.pipeline();
    let retriever = MemoryRetriever::new(pipeline.index(), pipeline.embedder(), pipeline.config());

    let indices = retriever
        .retrieve(request)
        .await
        .context("Memory lookup failed")?;
    let entries = retriever.blocks_by_indices(&indices).await;

    if entries.is_empty() {
        println!("{}", "No matching memories".dimmed());
        return Ok(());
    }
    for (index, entry) in entries {
        print_entry(index, &entry);
    }
    Ok(())
}

fn print_entry(index: usize, entry: &IndexedMemory) {
    println!(
        "{} {} {} {}",
        format!("#{index}").dimmed(),
        entry.level().as_str().cyan(),
        entry.timestamp(),
        entry.window().bold()
    );
    let summary = entry.summary();
    if !summary.is_empty() {
        println!("  {}", truncate_chars(&summary, 200).replace('\n', "\n  "));
    }
}

async fn rebuild(config: &Config) -> Result<()> {
    let nexus = open_nexus(config).await?;
    let len = nexus
        .pipeline()
        .rebuild_index()
        .await
        .context("Failed to rebuild index")?;
    println!("{} Rebuilt index with {} entries", "✓".green(), len);
    Ok(())
}

/// Parse `key=substring` filters.
fn parse_filters(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|f| match f.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("Invalid filter '{}'. Use key=substring", f),
        })
        .collect()
}
