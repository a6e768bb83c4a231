//! Feeding activity records into memory.
//!
//! Both commands read JSON lines, one activity record per line:
//!
//! ```json
//! {"active_window": "Terminal - cargo", "extracted_text": "...", "context_summary": "running tests"}
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

use nexus_core::ActivityRecord;
use nexus_sdk::{ObservationSource, SDKError, SDKResult};

use super::open_nexus;
use crate::config::Config;

/// One observation as written by an external capture tool.
#[derive(Debug, Deserialize)]
pub struct ObservationLine {
    pub active_window: String,
    #[serde(default)]
    pub extracted_text: String,
    #[serde(default)]
    pub typed_text: String,
    #[serde(default)]
    pub context_summary: String,
    pub timestamp: Option<String>,
    pub cpu_percent: Option<f32>,
    pub memory_percent: Option<f32>,
    pub code_version_path: Option<String>,
}

impl ObservationLine {
    pub fn into_record(self) -> ActivityRecord {
        let mut record = ActivityRecord::new(self.active_window, &self.extracted_text)
            .with_summary(self.context_summary)
            .with_typed_text(self.typed_text)
            .with_resources(
                self.cpu_percent.unwrap_or_default(),
                self.memory_percent.unwrap_or_default(),
            );
        if let Some(ts) = self.timestamp {
            record = record.at(ts);
        }
        if let Some(path) = self.code_version_path {
            record = record.with_code_version(path);
        }
        record
    }
}

/// Parse one JSON line; blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ActivityRecord>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let parsed: ObservationLine =
        serde_json::from_str(line).context("Invalid activity record line")?;
    Ok(Some(parsed.into_record()))
}

/// Observation source reading one line of stdin per cycle.
struct StdinSource {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

#[async_trait]
impl ObservationSource for StdinSource {
    async fn next_observation(&self) -> SDKResult<Option<ActivityRecord>> {
        let mut lines = self.lines.lock().await;
        match lines.next_line().await? {
            Some(line) => parse_line(&line).map_err(|e| SDKError::invalid_operation(format!("{e:#}"))),
            None => Ok(None),
        }
    }
}

/// Execute observe command: run the observation loop until Ctrl-C.
pub async fn observe(interval: Option<u64>, config: &Config) -> Result<()> {
    let nexus = open_nexus(config).await?;
    let source = Arc::new(StdinSource {
        lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
    });

    let handle = match interval {
        Some(secs) => nexus
            .pipeline()
            .spawn_observation_loop(source, Duration::from_secs(secs.max(1))),
        None => nexus.start_observing(source),
    };
    println!("{} Observing (Ctrl-C to stop)", "●".green());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    handle.shutdown().await;

    let stats = nexus.pipeline().stats().await;
    println!(
        "{} Stopped. raw={} medium={} long={} indexed={}",
        "✓".green(),
        stats.raw,
        stats.medium,
        stats.long,
        stats.indexed
    );
    Ok(())
}

/// Execute ingest command: run every line of `file` through one observation cycle.
pub async fn ingest(file: &Path, config: &Config) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let nexus = open_nexus(config).await?;
    let pipeline = nexus.pipeline();

    let lines: Vec<&str> = content.lines().collect();
    let progress = ProgressBar::new(lines.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let (mut ingested, mut skipped, mut compactions, mut super_blocks) = (0, 0, 0, 0);
    for (number, line) in lines.iter().enumerate() {
        progress.inc(1);
        let record = match parse_line(line) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = number + 1, error = %e, "Skipping line");
                skipped += 1;
                continue;
            }
        };

        let report = pipeline.observe(record).await;
        if let Some(error) = &report.error {
            progress.set_message(format!("line {}: {error}", number + 1));
        }
        ingested += usize::from(report.buffered);
        compactions += usize::from(report.compacted);
        super_blocks += report.super_blocks;
    }
    progress.finish_and_clear();

    println!(
        "{} Ingested {} records ({} compactions, {} super blocks)",
        "✓".green(),
        ingested,
        compactions,
        super_blocks
    );
    if skipped > 0 {
        println!("  {} {} lines skipped", "!".yellow(), skipped);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_line() {
        let record = parse_line(
            r#"{"active_window": "Chrome - docs", "extracted_text": "rust book", "timestamp": "2024-03-09T10:00:00", "cpu_percent": 12.5}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(record.timestamp, "2024-03-09T10:00:00");
        assert_eq!(record.cpu_percent, 12.5);
        assert!(record.tags.contains(&"browser".to_string()));
    }

    #[test]
    fn test_parse_defaults_timestamp_to_now() {
        let record = parse_line(r#"{"active_window": "Terminal"}"#).unwrap().unwrap();
        assert!(!record.timestamp.is_empty());
        assert!(record.extracted_text.is_empty());
    }

    #[test]
    fn test_blank_and_invalid_lines() {
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("{not json").is_err());
        assert!(parse_line(r#"{"extracted_text": "no window"}"#).is_err());
    }
}
