//! JSON list stores and the data directory layout.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Read a JSON document, returning `T::default()` when the file does not exist.
pub fn load_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(T::default()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Write a value as pretty JSON through a temp file and rename.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)?;
    write_atomic(path, |file| file.write_all(&body))
}

/// Write `path` by filling a sibling temp file and renaming it into place.
///
/// Parent directories are created as needed.
pub fn write_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        fill(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// File layout under the data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Binary vector index
    pub fn index(&self) -> PathBuf {
        self.root.join("memory").join("index.bin")
    }

    /// Metadata aligned with the vector index
    pub fn metadata(&self) -> PathBuf {
        self.root.join("memory").join("metadata.json")
    }

    /// Raw activity buffer
    pub fn raw_buffer(&self) -> PathBuf {
        self.root.join("temp").join("raw_buffer.json")
    }

    pub fn compiled_blocks(&self) -> PathBuf {
        self.root.join("memory").join("compiled_blocks.json")
    }

    pub fn long_term(&self) -> PathBuf {
        self.root.join("memory").join("long_term.json")
    }

    pub fn turns(&self) -> PathBuf {
        self.root.join("conversations").join("turns.json")
    }

    pub fn sessions(&self) -> PathBuf {
        self.root.join("conversations").join("sessions.json")
    }

    pub fn execution_trace(&self) -> PathBuf {
        self.root.join("logs").join("execution_trace.json")
    }

    /// Directory holding code snapshots, one subdirectory per project
    pub fn code_versions(&self) -> PathBuf {
        self.root.join("code_versions")
    }
}
