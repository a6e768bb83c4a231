//! Tiered activity memory.
//!
//! - **embeddings**: text to vector backends
//! - **pipeline**: buffering, compaction and consolidation kept in sync with the index
//! - **retriever**: semantic, temporal and most-recent lookups

pub mod embeddings;
pub mod pipeline;
pub mod retriever;

pub use embeddings::{EMBEDDING_DIMENSIONS, Embedder, EmbeddingService, HashingEmbedder};
pub use pipeline::{
    CycleReport, MemoryPipeline, MemoryStats, ObservationHandle, ObservationSource, SharedIndex,
};
pub use retriever::{MemoryRetriever, RetrievalMode, RetrievalRequest};
