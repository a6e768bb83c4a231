//! Memory lookup over the shared vector index.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use nexus_core::{IndexedMemory, MemoryLevel};

use super::embeddings::Embedder;
use super::pipeline::SharedIndex;
use crate::SDKResult;
use crate::config::MemoryConfig;

/// How to select memory entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Nearest neighbors of the query, ranked by level preference then distance
    Semantic,
    /// Entries whose timestamp lies in `[start, end]`, compared as strings
    Temporal { start: String, end: String },
    /// The most recently indexed entry
    MostRecent,
}

/// Parameters of one lookup.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    pub mode: RetrievalMode,
    pub k: Option<usize>,
    pub preference: Vec<MemoryLevel>,
    /// `(field, substring)` pairs that must all match
    pub filters: Vec<(String, String)>,
}

impl RetrievalRequest {
    pub fn semantic(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: RetrievalMode::Semantic,
            k: None,
            preference: MemoryLevel::DEFAULT_PREFERENCE.to_vec(),
            filters: Vec::new(),
        }
    }

    pub fn temporal(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            mode: RetrievalMode::Temporal {
                start: start.into(),
                end: end.into(),
            },
            ..Self::semantic("")
        }
    }

    pub fn most_recent() -> Self {
        Self {
            mode: RetrievalMode::MostRecent,
            ..Self::semantic("")
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_preference(mut self, preference: Vec<MemoryLevel>) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, substring: impl Into<String>) -> Self {
        self.filters.push((field.into(), substring.into()));
        self
    }
}

/// Read-side view of the memory index.
#[derive(Clone)]
pub struct MemoryRetriever {
    index: SharedIndex,
    embedder: Arc<dyn Embedder>,
    candidates: usize,
    temporal_limit: usize,
    default_k: usize,
}

impl MemoryRetriever {
    pub fn new(index: SharedIndex, embedder: Arc<dyn Embedder>, config: &MemoryConfig) -> Self {
        Self {
            index,
            embedder,
            candidates: config.semantic_candidates,
            temporal_limit: config.temporal_limit,
            default_k: config.default_k,
        }
    }

    /// Index positions selected by `request`, in result order.
    ///
    /// An empty index yields an empty result without embedding the query.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> SDKResult<Vec<usize>> {
        if self.index.read().await.is_empty() {
            return Ok(Vec::new());
        }

        let result = match &request.mode {
            RetrievalMode::Semantic => self.semantic(request).await?,
            RetrievalMode::Temporal { start, end } => self.temporal(start, end).await,
            RetrievalMode::MostRecent => {
                let len = self.index.read().await.len();
                len.checked_sub(1).into_iter().collect()
            }
        };

        debug!(mode = ?request.mode, hits = result.len(), "Memory retrieved");
        Ok(result)
    }

    async fn semantic(&self, request: &RetrievalRequest) -> SDKResult<Vec<usize>> {
        let vector = self.embedder.embed(&request.query).await?;
        let index = self.index.read().await;

        let allowed: Option<HashSet<usize>> = (!request.filters.is_empty()).then(|| {
            index
                .metadata()
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.matches_filters(&request.filters))
                .map(|(i, _)| i)
                .collect()
        });

        let mut hits: Vec<(usize, usize, f32)> = index
            .search(&vector, self.candidates)?
            .into_iter()
            .filter(|(i, _)| allowed.as_ref().is_none_or(|set| set.contains(i)))
            .filter_map(|(i, distance)| {
                let entry = index.get(i)?;
                Some((i, level_rank(entry, &request.preference), distance))
            })
            .collect();

        hits.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.total_cmp(&b.2)));

        Ok(hits
            .into_iter()
            .take(request.k.unwrap_or(self.default_k))
            .map(|(i, _, _)| i)
            .collect())
    }

    async fn temporal(&self, start: &str, end: &str) -> Vec<usize> {
        let index = self.index.read().await;
        index
            .metadata()
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                let ts = entry.timestamp();
                ts >= start && ts <= end
            })
            .map(|(i, _)| i)
            .take(self.temporal_limit)
            .collect()
    }

    /// Metadata for the given positions; out-of-range positions are skipped.
    pub async fn blocks_by_indices(&self, indices: &[usize]) -> Vec<(usize, IndexedMemory)> {
        let index = self.index.read().await;
        indices
            .iter()
            .filter_map(|&i| index.get(i).map(|entry| (i, entry.clone())))
            .collect()
    }
}

/// Position of the entry's level in `preference`.
///
/// Levels absent from the preference share the rank of `longo`.
fn level_rank(entry: &IndexedMemory, preference: &[MemoryLevel]) -> usize {
    let position = |level: MemoryLevel| preference.iter().position(|l| *l == level);
    position(entry.level())
        .or_else(|| position(MemoryLevel::Long))
        .unwrap_or(preference.len())
}
