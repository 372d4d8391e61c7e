//! Construction of index stores.
//!
//! On-disk layout of one repository index:
//!
//! ```text
//! <repository-root>/
//! └─ .index/
//!    ├─ LOCK             # Advisory lock held by the open store
//!    └─ entries.journal  # Append-only mutation journal
//! ```

use crate::error::{CoreError, CoreResult};
use crate::index::journaled::{CompactionPolicy, JournaledIndexStore};
use crate::index::store::IndexStore;
use crate::types::RepositoryKey;
use crate::version::VersionOrdering;
use artindex_storage::{FileBackend, InMemoryBackend, StorageBackend, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Index directory inside a repository root.
pub const INDEX_DIR: &str = ".index";

/// Journal file inside the index directory.
pub const JOURNAL_FILE: &str = "entries.journal";

/// Lock file inside the index directory.
pub const LOCK_FILE: &str = "LOCK";

/// Creates the index store of a repository.
///
/// The manager calls `open` at most once per repository while a handle is
/// alive.
pub trait IndexStoreFactory: Send + Sync {
    /// Opens (creating if needed) the index of `key`, whose files live under
    /// `repository_root`.
    ///
    /// # Errors
    ///
    /// Returns `IndexLocked` if the index is held elsewhere and
    /// `IndexPersistence` if it cannot be read.
    fn open(
        &self,
        key: &RepositoryKey,
        repository_root: &Path,
        ordering: Arc<dyn VersionOrdering>,
    ) -> CoreResult<Box<dyn IndexStore>>;

    /// Deletes the persisted index of `key`. The index must not be open.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the index files cannot be removed.
    fn remove(&self, key: &RepositoryKey, repository_root: &Path) -> CoreResult<()>;
}

/// Stores each index as a journal file under the repository root.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileIndexStoreFactory {
    policy: CompactionPolicy,
}

impl FileIndexStoreFactory {
    /// Creates a factory using `policy` for every store.
    #[must_use]
    pub const fn new(policy: CompactionPolicy) -> Self {
        Self { policy }
    }
}

impl IndexStoreFactory for FileIndexStoreFactory {
    fn open(
        &self,
        key: &RepositoryKey,
        repository_root: &Path,
        ordering: Arc<dyn VersionOrdering>,
    ) -> CoreResult<Box<dyn IndexStore>> {
        let dir = repository_root.join(INDEX_DIR);
        fs::create_dir_all(&dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::IndexLocked {
                path: dir.display().to_string(),
            });
        }

        let backend = FileBackend::open(&dir.join(JOURNAL_FILE))
            .map_err(|e| CoreError::persistence(key, e))?;
        let store = JournaledIndexStore::open(key.clone(), Box::new(backend), ordering, self.policy)?
            .with_lock_file(lock_file);

        tracing::debug!(repository = %key, path = %dir.display(), "index store opened");
        Ok(Box::new(store))
    }

    fn remove(&self, key: &RepositoryKey, repository_root: &Path) -> CoreResult<()> {
        let dir = repository_root.join(INDEX_DIR);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!(repository = %key, path = %dir.display(), "index deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps every journal in process memory.
///
/// Journals outlive their stores, so closing and reopening an index keeps
/// its entries.
#[derive(Debug, Default)]
pub struct MemoryIndexStoreFactory {
    journals: Mutex<HashMap<RepositoryKey, Arc<Mutex<InMemoryBackend>>>>,
    opened: AtomicUsize,
}

impl MemoryIndexStoreFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stores opened so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl IndexStoreFactory for MemoryIndexStoreFactory {
    fn open(
        &self,
        key: &RepositoryKey,
        _repository_root: &Path,
        ordering: Arc<dyn VersionOrdering>,
    ) -> CoreResult<Box<dyn IndexStore>> {
        let journal = Arc::clone(self.journals.lock().entry(key.clone()).or_default());
        let store = JournaledIndexStore::open(
            key.clone(),
            Box::new(SharedBackend(journal)),
            ordering,
            CompactionPolicy::default(),
        )?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(store))
    }

    fn remove(&self, key: &RepositoryKey, _repository_root: &Path) -> CoreResult<()> {
        self.journals.lock().remove(key);
        Ok(())
    }
}

/// An in-memory journal shared between successive stores of one repository.
struct SharedBackend(Arc<Mutex<InMemoryBackend>>);

impl StorageBackend for SharedBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.0.lock().read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.0.lock().append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.0.lock().flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.0.lock().size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.0.lock().sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.0.lock().truncate(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Coordinate;
    use crate::index::entry::IndexEntry;
    use crate::index::predicate::Predicate;
    use crate::version::NumericAwareOrdering;
    use tempfile::tempdir;

    fn key() -> RepositoryKey {
        RepositoryKey::new("storage0", "releases")
    }

    fn entry() -> IndexEntry {
        let c = Coordinate::new("org.example", "lib", "1.0", "jar");
        let path = c.relative_path();
        IndexEntry::new(&key(), c, path)
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let temp = tempdir().unwrap();
        let factory = FileIndexStoreFactory::default();

        {
            let mut store = factory
                .open(&key(), temp.path(), Arc::new(NumericAwareOrdering))
                .unwrap();
            store.add(entry()).unwrap();
            store.flush().unwrap();
        }

        assert!(temp.path().join(INDEX_DIR).join(JOURNAL_FILE).exists());
        let store = factory
            .open(&key(), temp.path(), Arc::new(NumericAwareOrdering))
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let factory = FileIndexStoreFactory::default();

        let _first = factory
            .open(&key(), temp.path(), Arc::new(NumericAwareOrdering))
            .unwrap();
        let second = factory.open(&key(), temp.path(), Arc::new(NumericAwareOrdering));
        assert!(matches!(second, Err(CoreError::IndexLocked { .. })));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let factory = FileIndexStoreFactory::default();

        drop(
            factory
                .open(&key(), temp.path(), Arc::new(NumericAwareOrdering))
                .unwrap(),
        );
        assert!(factory
            .open(&key(), temp.path(), Arc::new(NumericAwareOrdering))
            .is_ok());
    }

    #[test]
    fn remove_deletes_index_dir() {
        let temp = tempdir().unwrap();
        let factory = FileIndexStoreFactory::default();
        drop(
            factory
                .open(&key(), temp.path(), Arc::new(NumericAwareOrdering))
                .unwrap(),
        );

        factory.remove(&key(), temp.path()).unwrap();
        assert!(!temp.path().join(INDEX_DIR).exists());
        factory.remove(&key(), temp.path()).unwrap();
    }

    #[test]
    fn corrupted_journal_fails_open() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join(INDEX_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(JOURNAL_FILE), b"garbage that is not a journal").unwrap();

        let result = FileIndexStoreFactory::default().open(
            &key(),
            temp.path(),
            Arc::new(NumericAwareOrdering),
        );
        assert!(matches!(result, Err(CoreError::IndexPersistence { .. })));
    }

    #[test]
    fn memory_journals_survive_reopen() {
        let factory = MemoryIndexStoreFactory::new();
        let root = Path::new("unused");

        let mut store = factory.open(&key(), root, Arc::new(NumericAwareOrdering)).unwrap();
        store.add(entry()).unwrap();
        drop(store);

        let store = factory.open(&key(), root, Arc::new(NumericAwareOrdering)).unwrap();
        assert_eq!(
            store
                .query("storage0", "releases", &Predicate::any())
                .count(),
            1
        );
        assert_eq!(factory.opened(), 2);

        factory.remove(&key(), root).unwrap();
        let store = factory.open(&key(), root, Arc::new(NumericAwareOrdering)).unwrap();
        assert!(store.is_empty());
    }
}
