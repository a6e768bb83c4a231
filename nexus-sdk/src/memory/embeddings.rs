//! Embedding backends for memory indexing and retrieval.
//!
//! - [`EmbeddingService`]: local all-MiniLM-L6-v2 inference via `fastembed`
//!   (384 dimensions, lazily loaded, `embeddings` feature)
//! - [`HashingEmbedder`]: deterministic bag-of-words hashing, no model needed
//!
//! Both implement [`Embedder`], which is what the pipeline and retriever use.
//!
//! # Usage
//!
//! ```ignore
//! use nexus_sdk::memory::embeddings::{Embedder, EmbeddingService};
//!
//! let service = EmbeddingService::new();
//! let vector = service.embed("editing main.rs in VS Code").await?;
//! assert_eq!(vector.len(), 384);
//! ```

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::{SDKError, SDKResult};

/// Embedding dimensions for all-MiniLM-L6-v2
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Text to fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces
    fn dimensions(&self) -> usize;

    /// Embed a single text
    async fn embed(&self, text: &str) -> SDKResult<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> SDKResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Embedding service backed by a local sentence-transformer model
#[cfg(feature = "embeddings")]
pub struct EmbeddingService {
    model: std::sync::Arc<tokio::sync::RwLock<Option<fastembed::TextEmbedding>>>,
}

#[cfg(not(feature = "embeddings"))]
pub struct EmbeddingService {
    _phantom: std::marker::PhantomData<()>,
}

impl Default for EmbeddingService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embeddings")]
impl EmbeddingService {
    /// Create a new embedding service
    pub fn new() -> Self {
        Self {
            model: std::sync::Arc::new(tokio::sync::RwLock::new(None)),
        }
    }

    /// Initialize the embedding model (lazy loading)
    async fn ensure_model(&self) -> SDKResult<()> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model_guard = self.model.read().await;
        if model_guard.is_some() {
            return Ok(());
        }
        drop(model_guard);

        let mut model_guard = self.model.write().await;
        if model_guard.is_some() {
            return Ok(());
        }

        tracing::info!("Loading embedding model: all-MiniLM-L6-v2");
        let start = std::time::Instant::now();

        let mut init_options = InitOptions::default();
        init_options.model_name = EmbeddingModel::AllMiniLML6V2;
        init_options.show_download_progress = false;

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| SDKError::embedding(format!("Failed to load embedding model: {}", e)))?;

        tracing::info!("Embedding model loaded in {:?}", start.elapsed());

        *model_guard = Some(model);
        Ok(())
    }

    async fn run(&self, texts: Vec<&str>) -> SDKResult<Vec<Vec<f32>>> {
        self.ensure_model().await?;

        let model_guard = self.model.read().await;
        let model = model_guard
            .as_ref()
            .ok_or_else(|| SDKError::embedding("Embedding model not initialized"))?;

        model
            .embed(texts, None)
            .map_err(|e| SDKError::embedding(format!("Failed to generate embeddings: {}", e)))
    }

    /// Check if the model is loaded
    pub async fn is_loaded(&self) -> bool {
        self.model.read().await.is_some()
    }
}

#[cfg(feature = "embeddings")]
#[async_trait]
impl Embedder for EmbeddingService {
    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    async fn embed(&self, text: &str) -> SDKResult<Vec<f32>> {
        self.run(vec![text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SDKError::embedding("No embedding generated"))
    }

    async fn embed_batch(&self, texts: &[String]) -> SDKResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.iter().map(String::as_str).collect()).await
    }
}

#[cfg(not(feature = "embeddings"))]
impl EmbeddingService {
    /// Create a new embedding service (no-op without embeddings feature)
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }

    /// Check if the model is loaded
    pub async fn is_loaded(&self) -> bool {
        false
    }
}

#[cfg(not(feature = "embeddings"))]
#[async_trait]
impl Embedder for EmbeddingService {
    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    /// Returns an error without the embeddings feature
    async fn embed(&self, _text: &str) -> SDKResult<Vec<f32>> {
        Err(SDKError::embedding(
            "Embeddings feature not enabled. Compile with --features embeddings",
        ))
    }
}

/// Deterministic feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed into one signed bucket and the
/// result is L2-normalized. Texts sharing words land close together, which is
/// enough for offline use and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dimensions;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> SDKResult<Vec<f32>> {
        Ok(self.vectorize(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    #[tokio::test]
    async fn test_hashing_is_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("git commit in terminal").await.unwrap();
        let b = embedder.embed("git commit in terminal").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIMENSIONS);
    }

    #[tokio::test]
    async fn test_hashing_similarity() {
        let embedder = HashingEmbedder::new(64);
        let query = embedder.embed("rust compiler error").await.unwrap();
        let near = embedder.embed("Rust compiler error in main").await.unwrap();
        let far = embedder.embed("watching cooking videos").await.unwrap();
        assert!(l2(&query, &near) < l2(&query, &far));
    }

    #[tokio::test]
    async fn test_hashing_empty_text_is_zero() {
        let embedder = HashingEmbedder::new(8);
        let v = embedder.embed("  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_hashing_is_normalized() {
        let embedder = HashingEmbedder::new(32);
        let v = tokio_test::block_on(embedder.embed("open the browser")).unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_default_batch_preserves_order() {
        let embedder = HashingEmbedder::new(16);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch[1], embedder.embed("beta").await.unwrap());
    }

    #[cfg(feature = "embeddings")]
    #[tokio::test]
    #[ignore = "requires model download (~90MB)"]
    async fn test_embed_single() {
        let service = EmbeddingService::new();
        let vector = service.embed("hello world").await.unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        assert!(service.is_loaded().await);
    }

    #[cfg(feature = "embeddings")]
    #[tokio::test]
    #[ignore = "requires model download (~90MB)"]
    async fn test_embed_batch() {
        let service = EmbeddingService::new();
        let texts = vec!["hello".to_string(), "world".to_string(), "test".to_string()];
        let results = service.embed_batch(&texts).await.unwrap();
        assert_eq!(results.len(), 3);
        for vector in results {
            assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        }
    }
}
