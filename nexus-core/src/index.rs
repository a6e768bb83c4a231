//! Flat L2 nearest-neighbor index with a position-aligned metadata list.
//!
//! Vectors live in a small binary file, metadata in a JSON array. Both are
//! rewritten after every mutation through a temp file and rename, so a reader
//! never sees a half-written file. The two writes are not transactional;
//! [`VectorIndex::open`] truncates both to the shorter length when they disagree.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::storage::{load_json_or_default, save_json, write_atomic};

const MAGIC: &[u8; 4] = b"NXVI";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// On-disk locations of an index and its metadata.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub vectors: PathBuf,
    pub metadata: PathBuf,
}

impl IndexPaths {
    pub fn new(vectors: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self {
            vectors: vectors.into(),
            metadata: metadata.into(),
        }
    }

    /// Whether both files are present on disk
    pub fn exist(&self) -> bool {
        self.vectors.exists() && self.metadata.exists()
    }
}

/// Exact nearest-neighbor index over fixed-dimension `f32` vectors.
///
/// `len(vectors) == len(metadata)` holds after every public mutation.
#[derive(Debug)]
pub struct VectorIndex<M> {
    dim: usize,
    vectors: Vec<f32>,
    metadata: Vec<M>,
    paths: Option<IndexPaths>,
}

impl<M> VectorIndex<M>
where
    M: Serialize + DeserializeOwned + Clone,
{
    /// Create an empty in-memory index
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
            metadata: Vec::new(),
            paths: None,
        }
    }

    /// Empty index that persists to `paths` on the next mutation.
    ///
    /// Used to replace an index whose vector file could not be read.
    pub fn empty_at(paths: IndexPaths, dim: usize) -> Self {
        Self {
            paths: Some(paths),
            ..Self::new(dim)
        }
    }

    /// Open an index from disk, creating an empty one when no files exist yet.
    pub fn open(paths: IndexPaths, dim: usize) -> Result<Self> {
        let mut vectors = if paths.vectors.exists() {
            read_vectors(&paths.vectors, dim)?
        } else {
            Vec::new()
        };
        let mut metadata: Vec<M> = load_json_or_default(&paths.metadata)?;

        let vector_count = vectors.len() / dim.max(1);
        if vector_count != metadata.len() {
            let keep = vector_count.min(metadata.len());
            warn!(
                vectors = vector_count,
                metadata = metadata.len(),
                keep,
                "Index and metadata out of sync, truncating to the shorter"
            );
            vectors.truncate(keep * dim);
            metadata.truncate(keep);
        }

        debug!(path = %paths.vectors.display(), len = metadata.len(), "Opened vector index");

        let index = Self {
            dim,
            vectors,
            metadata,
            paths: Some(paths),
        };
        if vector_count != index.metadata.len() {
            index.persist()?;
        }
        Ok(index)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Position-aligned metadata entries
    pub fn metadata(&self) -> &[M] {
        &self.metadata
    }

    pub fn get(&self, index: usize) -> Option<&M> {
        self.metadata.get(index)
    }

    /// Append one vector/metadata pair and persist both files.
    ///
    /// Returns the position of the new entry.
    pub fn add(&mut self, vector: &[f32], entry: M) -> Result<usize> {
        self.check_dim(vector)?;
        self.vectors.extend_from_slice(vector);
        self.metadata.push(entry);
        if let Err(e) = self.persist() {
            self.vectors.truncate(self.vectors.len() - self.dim);
            self.metadata.pop();
            return Err(e);
        }
        Ok(self.metadata.len() - 1)
    }

    /// Replace the whole content with the given pairs and persist.
    pub fn rebuild(&mut self, entries: Vec<(Vec<f32>, M)>) -> Result<()> {
        for (vector, _) in &entries {
            self.check_dim(vector)?;
        }
        self.vectors.clear();
        self.metadata.clear();
        for (vector, entry) in entries {
            self.vectors.extend_from_slice(&vector);
            self.metadata.push(entry);
        }
        self.persist()
    }

    /// Nearest neighbors by squared L2 distance, ascending.
    pub fn search(&self, query: &[f32], top_n: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dim(query)?;
        if self.dim == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, v)| (i, squared_l2(v, query)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_n);
        Ok(scored)
    }

    /// Write both files; a no-op for in-memory indexes.
    pub fn persist(&self) -> Result<()> {
        let Some(paths) = &self.paths else {
            return Ok(());
        };
        write_vectors(&paths.vectors, self.dim, &self.vectors)?;
        save_json(&paths.metadata, &self.metadata)?;
        Ok(())
    }

    fn check_dim(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn write_vectors(path: &Path, dim: usize, vectors: &[f32]) -> Result<()> {
    let count = if dim == 0 { 0 } else { vectors.len() / dim };
    let mut buf = Vec::with_capacity(HEADER_LEN + vectors.len() * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&(dim as u32).to_le_bytes());
    buf.extend_from_slice(&(count as u64).to_le_bytes());
    for value in vectors {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    write_atomic(path, |file| file.write_all(&buf))
}

fn read_vectors(path: &Path, dim: usize) -> Result<Vec<f32>> {
    let mut bytes = Vec::new();
    fs::File::open(path)?.read_to_end(&mut bytes)?;

    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(Error::corrupt_index(path, "missing header"));
    }
    let version = u32::from_le_bytes(le_array(&bytes[4..8]));
    if version != FORMAT_VERSION {
        return Err(Error::corrupt_index(
            path,
            format!("unsupported format version {version}"),
        ));
    }
    let stored_dim = u32::from_le_bytes(le_array(&bytes[8..12])) as usize;
    if stored_dim != dim {
        return Err(Error::DimensionMismatch {
            expected: dim,
            actual: stored_dim,
        });
    }
    let count = u64::from_le_bytes(le_array(&bytes[12..20])) as usize;

    // A torn write leaves fewer bytes than the header claims; keep whole vectors only.
    let available = (bytes.len() - HEADER_LEN) / 4 / dim.max(1);
    if available < count {
        warn!(path = %path.display(), count, available, "Vector file shorter than header");
    }
    let usable = count.min(available) * dim;

    Ok(bytes[HEADER_LEN..HEADER_LEN + usable * 4]
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(le_array(chunk)))
        .collect())
}

fn le_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&slice[..N]);
    out
}
