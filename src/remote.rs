//! Document Store - The Remote File Collaborator
//!
//! Token documents live in some repository the engine does not own. This
//! trait is the whole surface the engine needs from it. `LocalDirStore`
//! backs it with a plain directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::hashing::{batch_hash, document_hash};
use crate::patch::FilePatch;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Path {0} escapes the store root")]
    PathEscape(String),

    #[error("Stale document {file}: patch was built on {expected:?}, store has {actual:?}")]
    StaleDocument {
        file: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("{0} is not supported by this store")]
    Unsupported(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub id: String,
    pub message: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

pub trait DocumentStore {
    /// Token documents under `prefix`, sorted by path.
    fn list_files(&self, prefix: &str) -> Result<Vec<FileEntry>, StoreError>;

    /// `Ok(None)` when the file does not exist.
    fn read_file(&self, path: &str) -> Result<Option<String>, StoreError>;

    fn write_files(&mut self, batch: &[FilePatch], message: &str) -> Result<CommitRef, StoreError>;

    fn create_branch(&mut self, _name: &str, _from: &str) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("create_branch"))
    }

    fn open_pull_request(&mut self, _request: &PullRequest) -> Result<String, StoreError> {
        Err(StoreError::Unsupported("open_pull_request"))
    }
}

/// Refuse a patch whose base no longer matches what the store holds.
pub fn verify_base(patch: &FilePatch, current: Option<&str>) -> Result<(), StoreError> {
    let actual = current.map(document_hash);
    if actual != patch.base_hash {
        return Err(StoreError::StaleDocument {
            file: patch.source_file.clone(),
            expected: patch.base_hash.clone(),
            actual,
        });
    }
    Ok(())
}

/// A directory of `.json` token documents.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(relative);
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(StoreError::PathEscape(relative.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn walk(&self, dir: &Path, out: &mut Vec<FileEntry>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io { path: dir.to_path_buf(), source };
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, out)?;
            } else if path.extension().map_or(false, |e| e == "json") {
                let Ok(relative) = path.strip_prefix(&self.root) else { continue };
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                out.push(FileEntry {
                    path: relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/"),
                    size,
                });
            }
        }
        Ok(())
    }

    /// Write `patch` to a temp file next to its target. Returns (temp, target).
    fn stage(&self, patch: &FilePatch) -> Result<(PathBuf, PathBuf), StoreError> {
        let target = self.resolve(&patch.source_file)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp = target.with_extension("json.tmp");
        let io_err = |source| StoreError::Io { path: tmp.clone(), source };
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(patch.content.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        Ok((tmp, target))
    }
}

impl DocumentStore for LocalDirStore {
    fn list_files(&self, prefix: &str) -> Result<Vec<FileEntry>, StoreError> {
        let start = self.resolve(prefix)?;
        let mut out = Vec::new();
        if start.is_dir() {
            self.walk(&start, &mut out)?;
        } else {
            warn!(root = %self.root.display(), prefix, "No token directory at prefix");
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    fn read_file(&self, path: &str) -> Result<Option<String>, StoreError> {
        let full = self.resolve(path)?;
        match fs::read_to_string(&full) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path: full, source }),
        }
    }

    /// Checks every base, then stages every file beside its target, then
    /// renames them into place. A failure while staging leaves the documents
    /// untouched; only a failing rename can leave a batch half applied.
    fn write_files(&mut self, batch: &[FilePatch], message: &str) -> Result<CommitRef, StoreError> {
        for patch in batch {
            let current = self.read_file(&patch.source_file)?;
            verify_base(patch, current.as_deref())?;
        }

        let mut staged = Vec::with_capacity(batch.len());
        for patch in batch {
            match self.stage(patch) {
                Ok(paths) => staged.push(paths),
                Err(e) => {
                    for (tmp, _) in &staged {
                        let _ = fs::remove_file(tmp);
                    }
                    return Err(e);
                }
            }
        }
        for (tmp, target) in &staged {
            fs::rename(tmp, target).map_err(|source| StoreError::Io { path: target.clone(), source })?;
        }

        let id = batch_hash(
            batch.iter().map(|p| (p.source_file.as_str(), p.content_hash.as_str())),
            message,
        )?;
        info!(commit = %id, files = batch.len(), "Wrote token documents");

        Ok(CommitRef {
            id,
            message: message.to_string(),
            files: batch.iter().map(|p| p.source_file.clone()).collect(),
        })
    }
}
