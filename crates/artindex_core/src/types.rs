//! Core type definitions for artindex.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one repository inside one storage.
///
/// Every index handle, lock and metadata document is scoped by a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepositoryKey {
    /// Storage identifier.
    pub storage_id: String,
    /// Repository identifier within the storage.
    pub repository_id: String,
}

impl RepositoryKey {
    /// Creates a new key.
    pub fn new(storage_id: impl Into<String>, repository_id: impl Into<String>) -> Self {
        Self {
            storage_id: storage_id.into(),
            repository_id: repository_id.into(),
        }
    }

    /// Returns true if the key belongs to `storage_id`.
    #[must_use]
    pub fn in_storage(&self, storage_id: &str) -> bool {
        self.storage_id == storage_id
    }
}

impl fmt::Display for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.storage_id, self.repository_id)
    }
}

/// Lifecycle state of a repository index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// No handle is open.
    Closed,
    /// A handle is open and idle.
    Open,
    /// A rebuild holds the repository exclusively.
    Rebuilding,
}

impl IndexState {
    /// Returns true if a handle exists.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, IndexState::Open | IndexState::Rebuilding)
    }
}
