//! Memory record types for the three tiers.
//!
//! - [`ActivityRecord`]: one observation cycle (level `curto`)
//! - [`CompiledBlock`]: 20 compacted records (level `medio`)
//! - [`SuperBlock`]: 36 consolidated blocks (level `longo`)
//!
//! [`IndexedMemory`] is the metadata entry stored next to each vector in the
//! index; its `level` tag tells retrieval which tier an entry came from.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::util::{now_iso, truncate_chars};

/// Maximum characters of OCR text kept on a record.
pub const EXTRACTED_TEXT_LIMIT: usize = 300;

/// Memory tier of an indexed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryLevel {
    #[serde(rename = "curto")]
    Short,
    #[serde(rename = "medio")]
    Medium,
    #[serde(rename = "longo")]
    Long,
}

impl MemoryLevel {
    /// Default retrieval preference: short before medium before long.
    pub const DEFAULT_PREFERENCE: [MemoryLevel; 3] =
        [MemoryLevel::Short, MemoryLevel::Medium, MemoryLevel::Long];

    /// Convert from the persisted tag
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "curto" => Some(Self::Short),
            "medio" => Some(Self::Medium),
            "longo" => Some(Self::Long),
            _ => None,
        }
    }

    /// Convert to the persisted tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "curto",
            Self::Medium => "medio",
            Self::Long => "longo",
        }
    }

    /// Parse a preference chain such as `"curto>medio>longo"`.
    ///
    /// Unknown segments are skipped; an empty result falls back to the default order.
    pub fn parse_preference(chain: &str) -> Vec<MemoryLevel> {
        let parsed: Vec<MemoryLevel> = chain.split('>').filter_map(Self::from_str).collect();
        if parsed.is_empty() {
            Self::DEFAULT_PREFERENCE.to_vec()
        } else {
            parsed
        }
    }
}

impl std::fmt::Display for MemoryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw observation captured once per cycle. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub timestamp: String,
    pub active_window: String,
    #[serde(default)]
    pub extracted_text: String,
    #[serde(default)]
    pub typed_text: String,
    #[serde(default)]
    pub cpu_percent: f32,
    #[serde(default)]
    pub memory_percent: f32,
    #[serde(default)]
    pub context_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_version_path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ActivityRecord {
    /// Create a record stamped with the current local time.
    ///
    /// Extracted text is cut to [`EXTRACTED_TEXT_LIMIT`] characters and tags are
    /// derived from the window title and the full text.
    pub fn new(active_window: impl Into<String>, extracted_text: &str) -> Self {
        let active_window = active_window.into();
        let tags = derive_tags(&active_window, extracted_text);
        Self {
            timestamp: now_iso(),
            active_window,
            extracted_text: truncate_chars(extracted_text, EXTRACTED_TEXT_LIMIT).to_string(),
            typed_text: String::new(),
            cpu_percent: 0.0,
            memory_percent: 0.0,
            context_summary: String::new(),
            code_version_path: None,
            tags,
        }
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Set the generated context summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.context_summary = summary.into();
        self
    }

    /// Set the typed text
    pub fn with_typed_text(mut self, typed: impl Into<String>) -> Self {
        self.typed_text = typed.into();
        self
    }

    /// Set resource usage metrics
    pub fn with_resources(mut self, cpu_percent: f32, memory_percent: f32) -> Self {
        self.cpu_percent = cpu_percent;
        self.memory_percent = memory_percent;
        self
    }

    /// Set the code snapshot reference
    pub fn with_code_version(mut self, path: impl Into<String>) -> Self {
        self.code_version_path = Some(path.into());
        self
    }

    /// Replace the derived tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        self.tags = set.into_iter().collect();
        self
    }

    /// Text embedded for this record: window title plus context summary.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.active_window, self.context_summary)
    }
}

/// Derive coarse activity tags from the window title and screen text.
pub fn derive_tags(active_window: &str, extracted_text: &str) -> Vec<String> {
    let window = active_window.to_lowercase();
    let text = extracted_text.to_lowercase();
    let mut tags = BTreeSet::new();

    if ["chrome", "edge", "firefox"].iter().any(|k| window.contains(k)) {
        tags.insert("browser");
    }
    if ["stack", "git", "python", "error"].iter().any(|k| text.contains(k)) {
        tags.insert("development");
    }
    if ["word", ".doc", ".pdf", "texto"].iter().any(|k| text.contains(k)) {
        tags.insert("document");
    }

    tags.into_iter().map(String::from).collect()
}

/// Medium-tier summary of a contiguous run of activity records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledBlock {
    pub start: String,
    pub end: String,
    pub hash: String,
    pub period: String,
    pub dominant_window: String,
    pub top_tags: Vec<String>,
    pub context_summary: String,
    pub record_count: usize,
}

/// Long-tier consolidation of a contiguous run of compiled blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperBlock {
    pub generated_at: String,
    pub block_count: usize,
    pub period: String,
    pub summaries: Vec<String>,
    pub tags: BTreeSet<String>,
}

impl SuperBlock {
    /// Text embedded for this block: period, tags and every summary.
    pub fn embedding_text(&self) -> String {
        let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
        format!(
            "{} [{}]\n{}",
            self.period,
            tags.join(", "),
            self.summaries.join("\n")
        )
    }
}

/// Metadata entry aligned with one vector in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "level")]
pub enum IndexedMemory {
    #[serde(rename = "curto")]
    Activity(ActivityRecord),
    #[serde(rename = "medio")]
    Compiled(CompiledBlock),
    #[serde(rename = "longo")]
    Super(SuperBlock),
}

impl IndexedMemory {
    pub fn level(&self) -> MemoryLevel {
        match self {
            Self::Activity(_) => MemoryLevel::Short,
            Self::Compiled(_) => MemoryLevel::Medium,
            Self::Super(_) => MemoryLevel::Long,
        }
    }

    /// Timestamp used for temporal lookups.
    ///
    /// Compiled blocks answer with their start, super blocks with their generation time.
    pub fn timestamp(&self) -> &str {
        match self {
            Self::Activity(r) => &r.timestamp,
            Self::Compiled(b) => &b.start,
            Self::Super(b) => &b.generated_at,
        }
    }

    pub fn summary(&self) -> Cow<'_, str> {
        match self {
            Self::Activity(r) => Cow::Borrowed(&r.context_summary),
            Self::Compiled(b) => Cow::Borrowed(&b.context_summary),
            Self::Super(b) => Cow::Owned(b.summaries.join("\n")),
        }
    }

    pub fn window(&self) -> &str {
        match self {
            Self::Activity(r) => &r.active_window,
            Self::Compiled(b) => &b.dominant_window,
            Self::Super(_) => "",
        }
    }

    /// Text that was embedded for this entry; used when rebuilding the index.
    pub fn embedding_text(&self) -> String {
        match self {
            Self::Activity(r) => r.embedding_text(),
            Self::Compiled(b) => b.context_summary.clone(),
            Self::Super(b) => b.embedding_text(),
        }
    }

    /// Textual value of a top-level field, as used by structured filters.
    ///
    /// Strings are returned verbatim, other JSON values in compact form,
    /// missing fields as `None`.
    pub fn field_text(&self, key: &str) -> Option<String> {
        let value = serde_json::to_value(self).ok()?;
        match value.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Whether every `(key, substring)` filter matches this entry.
    ///
    /// A missing field is treated as an empty string.
    pub fn matches_filters(&self, filters: &[(String, String)]) -> bool {
        filters.iter().all(|(key, needle)| {
            self.field_text(key)
                .unwrap_or_default()
                .contains(needle.as_str())
        })
    }
}

impl From<ActivityRecord> for IndexedMemory {
    fn from(record: ActivityRecord) -> Self {
        Self::Activity(record)
    }
}

impl From<CompiledBlock> for IndexedMemory {
    fn from(block: CompiledBlock) -> Self {
        Self::Compiled(block)
    }
}

impl From<SuperBlock> for IndexedMemory {
    fn from(block: SuperBlock) -> Self {
        Self::Super(block)
    }
}
