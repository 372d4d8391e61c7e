//! The index store capability.

use crate::error::CoreResult;
use crate::index::entry::IndexEntry;
use crate::index::predicate::Predicate;
use crate::types::RepositoryKey;
use std::sync::Arc;

/// Index of one repository's artifact files.
///
/// Mutations are persisted by the implementation; a mutation that returns
/// an error has not changed what later queries see.
pub trait IndexStore: Send + Sync {
    /// Repository this store belongs to.
    fn key(&self) -> &RepositoryKey;

    /// Inserts `entry`, replacing any entry with the same relative path.
    ///
    /// # Errors
    ///
    /// Returns `IndexPersistence` if the change could not be recorded, or
    /// `InvalidOperation` if the entry belongs to another repository.
    fn add(&mut self, entry: IndexEntry) -> CoreResult<()>;

    /// Removes the entry for `relative_path`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `IndexPersistence` if the change could not be recorded.
    fn remove(
        &mut self,
        storage_id: &str,
        repository_id: &str,
        relative_path: &str,
    ) -> CoreResult<bool>;

    /// Returns the entries matching `predicate`, ordered by
    /// `(groupId, artifactId, version)` with ties in insertion order.
    fn query(&self, storage_id: &str, repository_id: &str, predicate: &Predicate) -> QueryResults;

    /// Removes every entry of the repository.
    ///
    /// # Errors
    ///
    /// Returns `IndexPersistence` if the change could not be recorded.
    fn clear(&mut self, storage_id: &str, repository_id: &str) -> CoreResult<()>;

    /// Makes every recorded change durable.
    ///
    /// # Errors
    ///
    /// Returns `IndexPersistence` on I/O failure.
    fn flush(&mut self) -> CoreResult<()>;

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Returns true if the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if changes were recorded since the last flush.
    fn is_dirty(&self) -> bool;
}

/// The lazily filtered result of [`IndexStore::query`].
///
/// Results hold a snapshot of the store taken at query time, so they neither
/// borrow the store nor observe later mutations. Every call to
/// [`QueryResults::iter`] restarts from the first match.
#[derive(Debug, Clone)]
pub struct QueryResults {
    snapshot: Arc<[IndexEntry]>,
    predicate: Arc<Predicate>,
}

impl QueryResults {
    pub(crate) fn new(snapshot: Arc<[IndexEntry]>, predicate: &Predicate) -> Self {
        Self {
            snapshot,
            predicate: Arc::new(predicate.clone()),
        }
    }

    /// Results that match nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            snapshot: Arc::from(Vec::new()),
            predicate: Arc::new(Predicate::any()),
        }
    }

    /// Returns an iterator over the matching entries.
    #[must_use]
    pub fn iter(&self) -> QueryIter {
        QueryIter {
            snapshot: Arc::clone(&self.snapshot),
            predicate: Arc::clone(&self.predicate),
            position: 0,
        }
    }

    /// Counts the matching entries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.iter().count()
    }
}

impl IntoIterator for QueryResults {
    type Item = IndexEntry;
    type IntoIter = QueryIter;

    fn into_iter(self) -> QueryIter {
        QueryIter {
            snapshot: self.snapshot,
            predicate: self.predicate,
            position: 0,
        }
    }
}

impl IntoIterator for &QueryResults {
    type Item = IndexEntry;
    type IntoIter = QueryIter;

    fn into_iter(self) -> QueryIter {
        self.iter()
    }
}

/// Iterator over [`QueryResults`].
#[derive(Debug, Clone)]
pub struct QueryIter {
    snapshot: Arc<[IndexEntry]>,
    predicate: Arc<Predicate>,
    position: usize,
}

impl Iterator for QueryIter {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<IndexEntry> {
        while let Some(entry) = self.snapshot.get(self.position) {
            self.position += 1;
            if self.predicate.matches(&entry.coordinate) {
                return Some(entry.clone());
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.snapshot.len().saturating_sub(self.position)))
    }
}
