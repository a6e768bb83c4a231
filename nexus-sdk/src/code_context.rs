//! Code snapshots used as context for code questions.
//!
//! A snapshot is one text file concatenating a project's source files, stored as
//! `code_versions/<project>/code_summary_<stamp>_<hash>.txt`. Identical content
//! is never written twice.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::Local;
use tracing::{debug, info, warn};

use nexus_core::util::content_hash;

use crate::{SDKError, SDKResult};

/// Directories never descended into.
pub const SKIP_DIRS: &[&str] = &[
    "local",
    "venv",
    "__pycache__",
    "node_modules",
    "build",
    "dist",
    "target",
];

/// File extensions included in a snapshot.
pub const CODE_EXTENSIONS: &[&str] = &[
    "py", "ipynb", "js", "ts", "java", "c", "cpp", "cs", "go", "rb", "rs", "php",
];

const HASH_PREFIX_LEN: usize = 10;

/// Source of the latest code summary.
#[async_trait]
pub trait CodeContext: Send + Sync {
    /// Most recent summary, or `None` when no snapshot exists
    async fn latest_summary(&self) -> SDKResult<Option<String>>;
}

/// Snapshot directory on disk.
#[derive(Debug, Clone)]
pub struct CodeSnapshotStore {
    root: PathBuf,
}

impl CodeSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write a snapshot of `project_root` and return its path.
    ///
    /// Returns the existing file when a snapshot with the same content hash is present.
    pub fn snapshot(&self, project_root: &Path) -> SDKResult<PathBuf> {
        if !project_root.is_dir() {
            return Err(SDKError::not_found("project directory", project_root.display().to_string()));
        }

        let mut files = Vec::new();
        collect_sources(project_root, &mut files)?;

        let mut parts = Vec::with_capacity(files.len());
        for file in &files {
            let bytes = match fs::read(file) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };
            let relative = file.strip_prefix(project_root).unwrap_or(file);
            parts.push(format!(
                "# ==== {} ====\n{}\n",
                relative.display(),
                String::from_utf8_lossy(&bytes)
            ));
        }
        let full = parts.join("\n");
        let hash = &content_hash(&full)[..HASH_PREFIX_LEN];

        let slug = project_root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "project".to_string());
        let version_dir = self.root.join(&slug);
        fs::create_dir_all(&version_dir)?;

        let suffix = format!("_{hash}.txt");
        for entry in fs::read_dir(&version_dir)? {
            let path = entry?.path();
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if name.starts_with("code_summary_") && name.ends_with(&suffix) {
                debug!(path = %path.display(), "Snapshot already exists");
                return Ok(path);
            }
        }

        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let out = version_dir.join(format!("code_summary_{stamp}{suffix}"));
        fs::write(&out, full)?;
        info!(path = %out.display(), files = files.len(), "Code snapshot written");
        Ok(out)
    }

    /// Newest `*.txt` across all project directories, by modification time.
    pub fn latest_path(&self) -> SDKResult<Option<PathBuf>> {
        if !self.root.is_dir() {
            return Ok(None);
        }

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for project in fs::read_dir(&self.root)? {
            let project = project?.path();
            if !project.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&project)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                    continue;
                }
                let modified = fs::metadata(&path)?.modified()?;
                if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
                    newest = Some((modified, path));
                }
            }
        }
        Ok(newest.map(|(_, path)| path))
    }
}

#[async_trait]
impl CodeContext for CodeSnapshotStore {
    async fn latest_summary(&self) -> SDKResult<Option<String>> {
        let Some(path) = self.latest_path()? else {
            return Ok(None);
        };
        let content = tokio::fs::read_to_string(&path).await?;
        Ok((!content.trim().is_empty()).then_some(content))
    }
}

fn collect_sources(dir: &Path, out: &mut Vec<PathBuf>) -> SDKResult<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if path.is_dir() {
            if name.starts_with('.') || SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            collect_sources(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| CODE_EXTENSIONS.contains(&ext))
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("README.md"), "# readme").unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "junk").unwrap();
        fs::write(dir.path().join(".git/config.py"), "junk").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_no_snapshot_is_none() {
        let store = CodeSnapshotStore::new(TempDir::new().unwrap().path().join("missing"));
        assert!(store.latest_summary().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_contents_and_dedupe() {
        let data = TempDir::new().unwrap();
        let project = project();
        let store = CodeSnapshotStore::new(data.path().join("code_versions"));

        let first = store.snapshot(project.path()).unwrap();
        let second = store.snapshot(project.path()).unwrap();
        assert_eq!(first, second);

        let summary = store.latest_summary().await.unwrap().unwrap();
        assert!(summary.contains("main.rs"));
        assert!(summary.contains("fn main() {}"));
        assert!(!summary.contains("junk"));
        assert!(!summary.contains("readme"));
    }

    #[test]
    fn test_snapshot_missing_project() {
        let data = TempDir::new().unwrap();
        let store = CodeSnapshotStore::new(data.path());
        let err = store.snapshot(Path::new("/no/such/project")).unwrap_err();
        assert!(err.is_not_found());
    }
}
