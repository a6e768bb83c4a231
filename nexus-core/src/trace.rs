//! Execution trace of orchestration runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{load_json_or_default, save_json};

/// One node visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub node: String,
    pub started_at: String,
    pub finished_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

/// Records kept in the trace file; older ones are dropped on append.
pub const MAX_TRACE_RECORDS: usize = 500;

/// JSON array of the most recent node visits, rewritten on each append.
#[derive(Debug, Clone)]
pub struct TraceLog {
    path: PathBuf,
    max_records: usize,
}

impl TraceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_records: MAX_TRACE_RECORDS,
        }
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn append(&self, records: &[TraceRecord]) -> Result<()> {
        let mut all: Vec<TraceRecord> = load_json_or_default(&self.path)?;
        all.extend_from_slice(records);
        let excess = all.len().saturating_sub(self.max_records);
        all.drain(..excess);
        save_json(&self.path, &all)
    }

    pub fn read(&self) -> Result<Vec<TraceRecord>> {
        load_json_or_default(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(node: &str) -> TraceRecord {
        TraceRecord {
            node: node.into(),
            started_at: "2024-03-10T10:00:00".into(),
            finished_at: "2024-03-10T10:00:01".into(),
            question: Some("hi".into()),
            outcome: None,
        }
    }

    #[test]
    fn test_append_accumulates() {
        let dir = TempDir::new().unwrap();
        let log = TraceLog::new(dir.path().join("logs").join("trace.json"));
        log.append(&[record("finalize")]).unwrap();
        log.append(&[record("finalize")]).unwrap();
        assert_eq!(log.read().unwrap().len(), 2);
    }

    #[test]
    fn test_append_keeps_newest_records() {
        let dir = TempDir::new().unwrap();
        let log = TraceLog::new(dir.path().join("trace.json")).with_max_records(3);
        for i in 0..5 {
            log.append(&[record(&format!("node{i}"))]).unwrap();
        }
        let nodes: Vec<String> = log.read().unwrap().into_iter().map(|r| r.node).collect();
        assert_eq!(nodes, vec!["node2", "node3", "node4"]);
    }
}
