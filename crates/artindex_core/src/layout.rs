//! Storage layer access.
//!
//! The manager never touches repository files directly; it enumerates them
//! through a [`StorageLayout`]. [`FsStorageLayout`] maps storages and
//! repositories onto a base directory:
//!
//! ```text
//! <base>/<storageId>/<repositoryId>/<group segments>/<artifactId>/<version>/<file>
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::RepositoryKey;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// One entry of a repository directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Entry name (a single path segment).
    pub name: String,
    /// Entry kind.
    pub kind: NodeKind,
}

/// Enumerates storages, repositories and their files.
pub trait StorageLayout: Send + Sync {
    /// Root directory of a repository. Index and metadata files are written
    /// below it.
    fn repository_root(&self, key: &RepositoryKey) -> PathBuf;

    /// Repositories of `storage_id`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the storage cannot be listed.
    fn repository_ids(&self, storage_id: &str) -> CoreResult<Vec<String>>;

    /// Entries of the directory at `relative_dir` (empty for the root),
    /// sorted by name. A missing directory lists as empty.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPath` for paths escaping the repository and an I/O
    /// error if the directory cannot be read.
    fn list(&self, key: &RepositoryKey, relative_dir: &str) -> CoreResult<Vec<Node>>;

    /// Kind of the entry at `relative_path`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPath` for paths escaping the repository and an I/O
    /// error if the entry exists but cannot be inspected.
    fn stat(&self, key: &RepositoryKey, relative_path: &str) -> CoreResult<Option<NodeKind>>;
}

/// A [`StorageLayout`] over a local directory tree.
#[derive(Debug, Clone)]
pub struct FsStorageLayout {
    base: PathBuf,
}

impl FsStorageLayout {
    /// Creates a layout rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn resolve(&self, key: &RepositoryKey, relative: &str) -> CoreResult<PathBuf> {
        let mut path = self.repository_root(key);
        for segment in relative.split(['/', '\\']).filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." || segment.contains(':') {
                return Err(CoreError::malformed_path(relative, "path escapes the repository"));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl StorageLayout for FsStorageLayout {
    fn repository_root(&self, key: &RepositoryKey) -> PathBuf {
        self.base.join(&key.storage_id).join(&key.repository_id)
    }

    fn repository_ids(&self, storage_id: &str) -> CoreResult<Vec<String>> {
        let dir = self.base.join(storage_id);
        let read = match fs::read_dir(&dir) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in read {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() && !name.starts_with('.') {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn list(&self, key: &RepositoryKey, relative_dir: &str) -> CoreResult<Vec<Node>> {
        let dir = self.resolve(key, relative_dir)?;
        let read = match fs::read_dir(&dir) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut nodes = Vec::new();
        for entry in read {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let kind = if file_type.is_dir() {
                NodeKind::Directory
            } else if file_type.is_file() {
                NodeKind::File
            } else {
                continue;
            };
            nodes.push(Node {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }

    fn stat(&self, key: &RepositoryKey, relative_path: &str) -> CoreResult<Option<NodeKind>> {
        let path = self.resolve(key, relative_path)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => Ok(Some(NodeKind::Directory)),
            Ok(_) => Ok(Some(NodeKind::File)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
