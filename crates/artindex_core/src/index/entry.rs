//! Index entries.

use crate::coordinate::Coordinate;
use crate::types::RepositoryKey;
use serde::{Deserialize, Serialize};

/// One indexed artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Coordinate extracted from the file path.
    pub coordinate: Coordinate,
    /// Storage holding the repository.
    pub storage_id: String,
    /// Repository holding the file.
    pub repository_id: String,
    /// File path relative to the repository root.
    pub relative_path: String,
}

impl IndexEntry {
    /// Creates an entry for `relative_path` in the repository `key`.
    pub fn new(key: &RepositoryKey, coordinate: Coordinate, relative_path: impl Into<String>) -> Self {
        Self {
            coordinate,
            storage_id: key.storage_id.clone(),
            repository_id: key.repository_id.clone(),
            relative_path: relative_path.into(),
        }
    }

    /// Returns true if the entry belongs to the given repository.
    #[must_use]
    pub fn belongs_to(&self, storage_id: &str, repository_id: &str) -> bool {
        self.storage_id == storage_id && self.repository_id == repository_id
    }

    /// Returns true if the file lies at or below `scope`.
    #[must_use]
    pub fn is_under(&self, scope: &str) -> bool {
        let scope = scope.trim_matches('/');
        scope.is_empty()
            || self.relative_path == scope
            || self
                .relative_path
                .strip_prefix(scope)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
