//! Coordinate search over repository indexes.

use crate::coordinate::Coordinate;
use crate::error::CoreResult;
use crate::index::{IndexEntry, Predicate};
use crate::manager::RepositoryIndexManager;
use std::sync::Arc;

/// Read-only search façade over a [`RepositoryIndexManager`].
///
/// Results are coordinates ordered by `(groupId, artifactId, version)`.
/// Searching a closed repository opens it; a repository whose index cannot
/// be opened fails the search instead of returning no matches.
#[derive(Debug, Clone)]
pub struct ArtifactSearch {
    manager: Arc<RepositoryIndexManager>,
}

impl ArtifactSearch {
    /// Creates a façade over `manager`.
    pub fn new(manager: Arc<RepositoryIndexManager>) -> Self {
        Self { manager }
    }

    /// Returns the coordinates matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns the error raised while opening or querying the index.
    pub fn search(
        &self,
        storage_id: &str,
        repository_id: &str,
        predicate: &Predicate,
    ) -> CoreResult<Vec<Coordinate>> {
        Ok(self
            .manager
            .query(storage_id, repository_id, predicate)?
            .into_iter()
            .map(|entry| entry.coordinate)
            .collect())
    }

    /// Parses `query` (`+g:org.example +a:lib c:sources`) and searches.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for unparsable queries, otherwise as
    /// [`Self::search`].
    pub fn search_query(
        &self,
        storage_id: &str,
        repository_id: &str,
        query: &str,
    ) -> CoreResult<Vec<Coordinate>> {
        let predicate: Predicate = query.parse()?;
        self.search(storage_id, repository_id, &predicate)
    }

    /// Returns the full index entries matching `predicate`.
    ///
    /// # Errors
    ///
    /// As [`Self::search`].
    pub fn entries(
        &self,
        storage_id: &str,
        repository_id: &str,
        predicate: &Predicate,
    ) -> CoreResult<Vec<IndexEntry>> {
        Ok(self
            .manager
            .query(storage_id, repository_id, predicate)?
            .into_iter()
            .collect())
    }

    /// Returns true if exactly `coordinate` is indexed.
    ///
    /// # Errors
    ///
    /// As [`Self::search`].
    pub fn contains(
        &self,
        storage_id: &str,
        repository_id: &str,
        coordinate: &Coordinate,
    ) -> CoreResult<bool> {
        let predicate = Predicate::for_coordinate(coordinate);
        Ok(self
            .manager
            .query(storage_id, repository_id, &predicate)?
            .iter()
            .next()
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artindex_testkit::TestStorage;

    #[test]
    fn search_returns_coordinates() {
        let storage = TestStorage::new();
        storage.generate_artifact("storage0", "releases", "org.example:lib:1.0");
        storage.generate_artifact("storage0", "releases", "org.example:lib:1.0:jar:sources");
        storage.generate_artifact("storage0", "releases", "org.example:other:2.0");

        let manager = Arc::new(RepositoryIndexManager::open(storage.base()));
        manager.rebuild("storage0", Some("releases"), None).unwrap();
        let search = ArtifactSearch::new(Arc::clone(&manager));

        let found = search
            .search_query("storage0", "releases", "+a:lib +p:jar")
            .unwrap();
        assert_eq!(found.len(), 2);

        let sources = Coordinate::new("org.example", "lib", "1.0", "jar").with_classifier("sources");
        assert!(search.contains("storage0", "releases", &sources).unwrap());
        let javadoc = Coordinate::new("org.example", "lib", "1.0", "jar").with_classifier("javadoc");
        assert!(!search.contains("storage0", "releases", &javadoc).unwrap());

        assert!(search.search_query("storage0", "releases", "+q:x").is_err());
    }
}
