//! Tiered activity memory: buffering, compaction and consolidation.
//!
//! ```text
//!  observe(record)
//!     │
//!     ▼
//!  raw buffer (≤20) ──compact──▶ compiled blocks (≤36, trim to 16) ──consolidate──▶ super blocks (≤50)
//!     │                               │                                               │
//!     └──────────────── embed + add to the vector index ──────────────────────────────┘
//! ```
//!
//! Every step embeds before it writes, so a failed embedding leaves the stores
//! untouched. A trimming compaction re-embeds the retained index entries before
//! committing anything. The tier lock is held for a whole step, which makes the pipeline
//! the single writer of the index and the three JSON lists.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use nexus_core::storage::{load_json_or_default, save_json};
use nexus_core::util::{content_hash, hour_minute, most_common, now_iso};
use nexus_core::{
    ActivityRecord, CompiledBlock, DataPaths, IndexPaths, IndexedMemory, SuperBlock, VectorIndex,
};

use super::embeddings::Embedder;
use crate::config::MemoryConfig;
use crate::{SDKError, SDKResult};

/// Vector index shared between the pipeline and the retriever.
pub type SharedIndex = Arc<RwLock<VectorIndex<IndexedMemory>>>;

/// Offsets of the digest lines within a compaction batch.
const DIGEST_OFFSETS: [usize; 4] = [0, 5, 10, 15];
const DIGEST_SPAN: usize = 4;
const TOP_TAGS: usize = 5;

#[derive(Debug, Default)]
struct TierState {
    raw: Vec<ActivityRecord>,
    medium: Vec<CompiledBlock>,
    long: Vec<SuperBlock>,
}

/// Outcome of one observation cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub buffered: bool,
    pub compacted: bool,
    pub super_blocks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Store sizes at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub raw: usize,
    pub medium: usize,
    pub long: usize,
    pub indexed: usize,
}

/// Supplies one activity record per observation cycle.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Next observation, or `None` when nothing changed this cycle
    async fn next_observation(&self) -> SDKResult<Option<ActivityRecord>>;
}

/// Running observation loop.
pub struct ObservationHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ObservationHandle {
    /// Stop the loop and wait for it to exit.
    ///
    /// A pending observation is abandoned; a running cycle completes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Observation loop ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Three-tier activity memory kept in sync with the vector index.
pub struct MemoryPipeline {
    config: MemoryConfig,
    paths: DataPaths,
    index: SharedIndex,
    embedder: Arc<dyn Embedder>,
    tiers: Mutex<TierState>,
}

impl MemoryPipeline {
    /// Open the stores under `paths`, creating empty ones when absent.
    ///
    /// An unreadable vector file is rebuilt from the index metadata.
    pub async fn open(
        config: MemoryConfig,
        paths: DataPaths,
        embedder: Arc<dyn Embedder>,
    ) -> SDKResult<Self> {
        config.validate()?;
        if embedder.dimensions() != config.embedding_dim {
            return Err(SDKError::embedding(format!(
                "embedder produces {} dimensions, memory expects {}",
                embedder.dimensions(),
                config.embedding_dim
            )));
        }

        let index_paths = IndexPaths::new(paths.index(), paths.metadata());
        let index = match VectorIndex::open(index_paths.clone(), config.embedding_dim) {
            Ok(index) => index,
            Err(e) if e.is_unreadable_index() => {
                warn!(error = %e, "Vector index unreadable, rebuilding from metadata");
                recover_index(index_paths, config.embedding_dim, embedder.as_ref()).await?
            }
            Err(e) => return Err(e.into()),
        };
        let tiers = TierState {
            raw: load_json_or_default(&paths.raw_buffer())?,
            medium: load_json_or_default(&paths.compiled_blocks())?,
            long: load_json_or_default(&paths.long_term())?,
        };

        info!(
            raw = tiers.raw.len(),
            medium = tiers.medium.len(),
            long = tiers.long.len(),
            indexed = index.len(),
            "Memory pipeline opened"
        );

        Ok(Self {
            config,
            paths,
            index: Arc::new(RwLock::new(index)),
            embedder,
            tiers: Mutex::new(tiers),
        })
    }

    /// Index handle for readers
    pub fn index(&self) -> SharedIndex {
        Arc::clone(&self.index)
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Run one observation cycle: buffer, compact, consolidate.
    ///
    /// Failures are logged and reported; the cycle stops at the failing step.
    pub async fn observe(&self, record: ActivityRecord) -> CycleReport {
        let mut report = CycleReport::default();

        if let Err(e) = self.buffer(record).await {
            warn!(error = %e, "Buffering failed, skipping cycle");
            report.error = Some(e.to_string());
            return report;
        }
        report.buffered = true;

        match self.compact().await {
            Ok(block) => report.compacted = block.is_some(),
            Err(e) => {
                warn!(error = %e, "Compaction failed, skipping cycle");
                report.error = Some(e.to_string());
                return report;
            }
        }

        match self.consolidate().await {
            Ok(blocks) => report.super_blocks = blocks.len(),
            Err(e) => {
                warn!(error = %e, "Consolidation failed");
                report.error = Some(e.to_string());
            }
        }

        report
    }

    /// Append a record to the raw buffer and index it immediately.
    ///
    /// Returns the index position of the new entry.
    pub async fn buffer(&self, record: ActivityRecord) -> SDKResult<usize> {
        let vector = self.embedder.embed(&record.embedding_text()).await?;

        let mut tiers = self.tiers.lock().await;
        tiers.raw.push(record.clone());
        if tiers.raw.len() > self.config.raw_buffer_cap {
            let excess = tiers.raw.len() - self.config.raw_buffer_cap;
            tiers.raw.drain(..excess);
        }
        save_json(&self.paths.raw_buffer(), &tiers.raw)?;

        let position = self
            .index
            .write()
            .await
            .add(&vector, IndexedMemory::Activity(record))?;
        debug!(position, raw = tiers.raw.len(), "Buffered activity");
        Ok(position)
    }

    /// Compact the oldest batch of raw records into one compiled block.
    ///
    /// Does nothing until the buffer holds a full batch.
    pub async fn compact(&self) -> SDKResult<Option<CompiledBlock>> {
        let mut tiers = self.tiers.lock().await;
        let batch_size = self.config.compaction_batch;
        if tiers.raw.len() < batch_size {
            return Ok(None);
        }

        let mut batch = tiers.raw[..batch_size].to_vec();
        batch.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        let block = compile_block(&batch);
        let vector = self.embedder.embed(&block.context_summary).await?;
        let entry = IndexedMemory::Compiled(block.clone());

        let mut medium = tiers.medium.clone();
        medium.push(block.clone());
        // A trim keeps only the newest index entries; embed them before any write.
        let rebuilt = if medium.len() > self.config.medium_cap {
            let excess = medium.len() - self.config.medium_trim_to;
            medium.drain(..excess);
            let keep = medium.len();
            info!(keep, "Compiled blocks trimmed, resynchronizing index");

            let mut retained = {
                let index = self.index.read().await;
                let metadata = index.metadata();
                metadata[metadata.len().saturating_sub(keep - 1)..].to_vec()
            };
            retained.push(entry.clone());
            Some(self.reembed(retained).await?)
        } else {
            None
        };

        let retain = self.config.raw_retained_after_compaction;
        let mut raw = tiers.raw.clone();
        let excess = raw.len().saturating_sub(retain);
        raw.drain(..excess);

        save_json(&self.paths.compiled_blocks(), &medium)?;
        save_json(&self.paths.raw_buffer(), &raw)?;
        tiers.medium = medium;
        tiers.raw = raw;

        {
            let mut index = self.index.write().await;
            match rebuilt {
                Some(entries) => index.rebuild(entries)?,
                None => {
                    index.add(&vector, entry)?;
                }
            }
        }

        info!(
            period = %block.period,
            window = %block.dominant_window,
            medium = tiers.medium.len(),
            "Compacted activity batch"
        );
        Ok(Some(block))
    }

    /// Fold compiled blocks into super blocks while a full batch is available.
    ///
    /// Each pass consumes the oldest batch but drops only the oldest
    /// `consolidation_drop` blocks, so later passes overlap earlier ones.
    pub async fn consolidate(&self) -> SDKResult<Vec<SuperBlock>> {
        let mut tiers = self.tiers.lock().await;
        let batch_size = self.config.consolidation_batch;
        let mut produced = Vec::new();

        while tiers.medium.len() >= batch_size {
            let block = consolidate_blocks(&tiers.medium[..batch_size]);
            let vector = if self.config.index_long_term {
                Some(self.embedder.embed(&block.embedding_text()).await?)
            } else {
                None
            };

            let mut long = tiers.long.clone();
            long.push(block.clone());
            if long.len() > self.config.long_term_cap {
                let excess = long.len() - self.config.long_term_cap;
                long.drain(..excess);
            }
            let medium = tiers.medium[self.config.consolidation_drop..].to_vec();

            save_json(&self.paths.long_term(), &long)?;
            save_json(&self.paths.compiled_blocks(), &medium)?;
            tiers.long = long;
            tiers.medium = medium;

            if let Some(vector) = vector {
                self.index
                    .write()
                    .await
                    .add(&vector, IndexedMemory::Super(block.clone()))?;
            }

            info!(
                period = %block.period,
                medium = tiers.medium.len(),
                long = tiers.long.len(),
                "Consolidated compiled blocks"
            );
            produced.push(block);
        }

        Ok(produced)
    }

    /// Re-embed every retained index entry and rewrite the index.
    ///
    /// Costs one embedding per entry.
    pub async fn rebuild_index(&self) -> SDKResult<usize> {
        let _tiers = self.tiers.lock().await;
        let retained = self.index.read().await.metadata().to_vec();
        let entries = self.reembed(retained).await?;

        let mut index = self.index.write().await;
        index.rebuild(entries)?;
        debug!(len = index.len(), "Vector index rebuilt");
        Ok(index.len())
    }

    async fn reembed(
        &self,
        entries: Vec<IndexedMemory>,
    ) -> SDKResult<Vec<(Vec<f32>, IndexedMemory)>> {
        embed_entries(self.embedder.as_ref(), entries).await
    }

    /// Current store sizes
    pub async fn stats(&self) -> MemoryStats {
        let tiers = self.tiers.lock().await;
        MemoryStats {
            raw: tiers.raw.len(),
            medium: tiers.medium.len(),
            long: tiers.long.len(),
            indexed: self.index.read().await.len(),
        }
    }

    pub async fn compiled_blocks(&self) -> Vec<CompiledBlock> {
        self.tiers.lock().await.medium.clone()
    }

    pub async fn super_blocks(&self) -> Vec<SuperBlock> {
        self.tiers.lock().await.long.clone()
    }

    /// Drive [`observe`](Self::observe) from `source` every `period`.
    pub fn spawn_observation_loop(
        self: Arc<Self>,
        source: Arc<dyn ObservationSource>,
        period: Duration,
    ) -> ObservationHandle {
        let (shutdown, mut stop) = watch::channel(false);

        info!(interval_secs = period.as_secs(), "Starting observation loop");
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.changed() => break,
                }

                let next = tokio::select! {
                    next = source.next_observation() => next,
                    _ = stop.changed() => break,
                };
                match next {
                    Ok(Some(record)) => {
                        let report = self.observe(record).await;
                        debug!(?report, "Observation cycle finished");
                    }
                    Ok(None) => debug!("No observation this cycle"),
                    Err(e) => warn!(error = %e, "Observation source failed"),
                }
            }
            info!("Observation loop stopped");
        });

        ObservationHandle { shutdown, task }
    }
}

async fn embed_entries(
    embedder: &dyn Embedder,
    entries: Vec<IndexedMemory>,
) -> SDKResult<Vec<(Vec<f32>, IndexedMemory)>> {
    let texts: Vec<String> = entries.iter().map(IndexedMemory::embedding_text).collect();
    let vectors = embedder.embed_batch(&texts).await?;
    if vectors.len() != entries.len() {
        return Err(SDKError::embedding(format!(
            "embedded {} of {} entries",
            vectors.len(),
            entries.len()
        )));
    }
    Ok(vectors.into_iter().zip(entries).collect())
}

/// Fresh index at `paths` holding whatever metadata is still readable.
///
/// Falls back to an empty index when the metadata or the embedder fails.
async fn recover_index(
    paths: IndexPaths,
    dim: usize,
    embedder: &dyn Embedder,
) -> SDKResult<VectorIndex<IndexedMemory>> {
    let metadata: Vec<IndexedMemory> = match load_json_or_default(&paths.metadata) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(error = %e, "Index metadata unreadable, starting empty");
            Vec::new()
        }
    };

    let mut index = VectorIndex::empty_at(paths, dim);
    let entries = match embed_entries(embedder, metadata).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Could not re-embed index metadata, starting empty");
            Vec::new()
        }
    };
    index.rebuild(entries)?;
    info!(len = index.len(), "Vector index recovered");
    Ok(index)
}

/// Summarize a chronologically ordered batch of records.
fn compile_block(batch: &[ActivityRecord]) -> CompiledBlock {
    let first = &batch[0];
    let last = &batch[batch.len() - 1];

    let dominant_window = most_common(batch.iter().map(|r| r.active_window.as_str()))
        .into_iter()
        .next()
        .map(|(window, _)| window)
        .unwrap_or_default();
    let top_tags = most_common(batch.iter().flat_map(|r| r.tags.iter().map(String::as_str)))
        .into_iter()
        .take(TOP_TAGS)
        .map(|(tag, _)| tag)
        .collect();

    let mut digest = String::from("Main activities:\n");
    for offset in DIGEST_OFFSETS.iter().copied().filter(|o| *o < batch.len()) {
        let start = &batch[offset];
        let end = &batch[(offset + DIGEST_SPAN).min(batch.len() - 1)];
        digest.push_str(&format!(
            "{}-{}: {}\n",
            hour_minute(&start.timestamp),
            hour_minute(&end.timestamp),
            start.active_window
        ));
    }

    CompiledBlock {
        start: first.timestamp.clone(),
        end: last.timestamp.clone(),
        hash: content_hash(&format!("{}{}", first.timestamp, last.timestamp)),
        period: format!(
            "{} to {}",
            hour_minute(&first.timestamp),
            hour_minute(&last.timestamp)
        ),
        dominant_window,
        top_tags,
        context_summary: digest.trim_end().to_string(),
        record_count: batch.len(),
    }
}

fn consolidate_blocks(blocks: &[CompiledBlock]) -> SuperBlock {
    let first = &blocks[0];
    let last = &blocks[blocks.len() - 1];

    SuperBlock {
        generated_at: now_iso(),
        block_count: blocks.len(),
        period: format!("{} to {}", hour_minute(&first.start), hour_minute(&last.end)),
        summaries: blocks.iter().map(|b| b.context_summary.clone()).collect(),
        tags: blocks.iter().flat_map(|b| b.top_tags.iter().cloned()).collect(),
    }
}
