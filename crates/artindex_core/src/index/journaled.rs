//! In-memory index store persisted through an append-only journal.

use crate::error::{CoreError, CoreResult};
use crate::index::entry::IndexEntry;
use crate::index::journal::{self, JournalRecord};
use crate::index::predicate::Predicate;
use crate::index::store::{IndexStore, QueryResults};
use crate::types::RepositoryKey;
use crate::version::VersionOrdering;
use artindex_storage::StorageBackend;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::sync::Arc;

/// When `flush` rewrites the journal down to its live entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    /// Compact once the journal holds more than this many records per live
    /// entry.
    pub ratio: usize,
    /// Never compact journals with fewer records than this.
    pub min_records: usize,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            ratio: 2,
            min_records: 1024,
        }
    }
}

impl CompactionPolicy {
    /// Returns true if a journal of `records` records with `live` live
    /// entries should be compacted.
    #[must_use]
    pub fn is_due(&self, records: usize, live: usize) -> bool {
        records >= self.min_records && records > self.ratio.saturating_mul(live.max(1))
    }
}

/// An [`IndexStore`] that keeps its entries in memory and journals every
/// mutation before applying it.
pub struct JournaledIndexStore {
    key: RepositoryKey,
    backend: Box<dyn StorageBackend>,
    ordering: Arc<dyn VersionOrdering>,
    /// relative path -> (insertion sequence, entry)
    entries: HashMap<String, (u64, IndexEntry)>,
    next_seq: u64,
    journal_records: usize,
    dirty: bool,
    /// Set when a rewrite failed midway; the next flush rewrites again.
    rewrite_pending: bool,
    policy: CompactionPolicy,
    sorted: Mutex<Option<Arc<[IndexEntry]>>>,
    _lock: Option<File>,
}

impl JournaledIndexStore {
    /// Opens the store, replaying the journal held by `backend`.
    ///
    /// A torn trailing record is cut off.
    ///
    /// # Errors
    ///
    /// Returns `IndexPersistence` if the journal is corrupted or cannot be
    /// read, repaired or initialized.
    pub fn open(
        key: RepositoryKey,
        mut backend: Box<dyn StorageBackend>,
        ordering: Arc<dyn VersionOrdering>,
        policy: CompactionPolicy,
    ) -> CoreResult<Self> {
        let replay = journal::replay(backend.as_ref()).map_err(|e| CoreError::persistence(&key, e))?;

        if replay.torn {
            tracing::warn!(
                repository = %key,
                valid_len = replay.valid_len,
                "discarding torn journal tail"
            );
            backend
                .truncate(replay.valid_len)
                .map_err(|e| CoreError::persistence(&key, e))?;
        }
        if replay.valid_len == 0 {
            backend
                .append(&journal::header())
                .and_then(|_| backend.flush())
                .map_err(|e| CoreError::persistence(&key, e))?;
        }

        let mut store = Self {
            key,
            backend,
            ordering,
            entries: HashMap::new(),
            next_seq: 0,
            journal_records: 0,
            dirty: false,
            rewrite_pending: false,
            policy,
            sorted: Mutex::new(None),
            _lock: None,
        };

        for record in replay.records {
            store.apply(record);
        }

        tracing::debug!(
            repository = %store.key,
            entries = store.entries.len(),
            records = store.journal_records,
            "index journal replayed"
        );

        Ok(store)
    }

    /// Opens a store over an empty in-memory journal.
    #[must_use]
    pub fn in_memory(key: RepositoryKey, ordering: Arc<dyn VersionOrdering>) -> Self {
        Self {
            key,
            backend: Box::new(artindex_storage::InMemoryBackend::with_data(journal::header())),
            ordering,
            entries: HashMap::new(),
            next_seq: 0,
            journal_records: 0,
            dirty: false,
            rewrite_pending: false,
            policy: CompactionPolicy::default(),
            sorted: Mutex::new(None),
            _lock: None,
        }
    }

    /// Keeps `lock` open for the lifetime of the store.
    #[must_use]
    pub(crate) fn with_lock_file(mut self, lock: File) -> Self {
        self._lock = Some(lock);
        self
    }

    /// Number of records in the journal.
    #[must_use]
    pub fn journal_records(&self) -> usize {
        self.journal_records
    }

    fn apply(&mut self, record: JournalRecord) {
        match record {
            JournalRecord::Upsert(entry) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(entry.relative_path.clone(), (seq, entry));
            }
            JournalRecord::Remove { relative_path } => {
                self.entries.remove(&relative_path);
            }
            JournalRecord::Clear => self.entries.clear(),
        }
        self.journal_records += 1;
        *self.sorted.get_mut() = None;
    }

    /// Journals `record`, then applies it.
    fn record(&mut self, record: JournalRecord) -> CoreResult<()> {
        // Frames only ever follow a complete rewrite.
        if self.rewrite_pending {
            self.compact()?;
        }
        let frame = journal::encode(&record).map_err(|e| CoreError::persistence(&self.key, e))?;
        let end = self
            .backend
            .size()
            .map_err(|e| CoreError::persistence(&self.key, e))?;
        if let Err(e) = self.backend.append(&frame) {
            // Later records must not land behind a partial frame.
            if self.backend.truncate(end).is_err() {
                self.rewrite_pending = true;
            }
            return Err(CoreError::persistence(&self.key, e));
        }
        self.apply(record);
        self.dirty = true;
        Ok(())
    }

    fn owns(&self, storage_id: &str, repository_id: &str) -> bool {
        self.key.storage_id == storage_id && self.key.repository_id == repository_id
    }

    fn compare(&self, a: &(u64, IndexEntry), b: &(u64, IndexEntry)) -> Ordering {
        let (x, y) = (&a.1.coordinate, &b.1.coordinate);
        x.group_id
            .cmp(&y.group_id)
            .then_with(|| x.artifact_id.cmp(&y.artifact_id))
            .then_with(|| self.ordering.compare(&x.version, &y.version))
            .then_with(|| a.0.cmp(&b.0))
    }

    fn snapshot(&self) -> Arc<[IndexEntry]> {
        let mut cached = self.sorted.lock();
        if let Some(snapshot) = cached.as_ref() {
            return Arc::clone(snapshot);
        }

        let mut live: Vec<&(u64, IndexEntry)> = self.entries.values().collect();
        live.sort_by(|a, b| self.compare(a, b));
        let snapshot: Arc<[IndexEntry]> = live.into_iter().map(|(_, e)| e.clone()).collect();
        *cached = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Rewrites the journal so it holds one record per live entry.
    fn compact(&mut self) -> CoreResult<()> {
        let mut live: Vec<&(u64, IndexEntry)> = self.entries.values().collect();
        live.sort_by_key(|(seq, _)| *seq);

        let mut buf = journal::header();
        for (_, entry) in live {
            let frame = journal::encode(&JournalRecord::Upsert(entry.clone()))
                .map_err(|e| CoreError::persistence(&self.key, e))?;
            buf.extend_from_slice(&frame);
        }

        self.rewrite_pending = true;
        if let Err(e) = self
            .backend
            .truncate(0)
            .and_then(|()| self.backend.append(&buf))
        {
            // Leave at least a valid, empty journal behind.
            let restored = self
                .backend
                .truncate(0)
                .and_then(|()| self.backend.append(&journal::header()));
            if let Err(restore) = restored {
                tracing::warn!(
                    repository = %self.key,
                    error = %restore,
                    "failed to restore journal header"
                );
            }
            return Err(CoreError::persistence(&self.key, e));
        }
        self.rewrite_pending = false;

        tracing::debug!(
            repository = %self.key,
            before = self.journal_records,
            after = self.entries.len(),
            "index journal compacted"
        );
        self.journal_records = self.entries.len();
        Ok(())
    }
}

impl IndexStore for JournaledIndexStore {
    fn key(&self) -> &RepositoryKey {
        &self.key
    }

    fn add(&mut self, entry: IndexEntry) -> CoreResult<()> {
        if !self.owns(&entry.storage_id, &entry.repository_id) {
            return Err(CoreError::invalid_operation(format!(
                "entry for {}:{} added to index of {}",
                entry.storage_id, entry.repository_id, self.key
            )));
        }
        self.record(JournalRecord::Upsert(entry))
    }

    fn remove(
        &mut self,
        storage_id: &str,
        repository_id: &str,
        relative_path: &str,
    ) -> CoreResult<bool> {
        if !self.owns(storage_id, repository_id) || !self.entries.contains_key(relative_path) {
            return Ok(false);
        }
        self.record(JournalRecord::Remove {
            relative_path: relative_path.to_string(),
        })?;
        Ok(true)
    }

    fn query(&self, storage_id: &str, repository_id: &str, predicate: &Predicate) -> QueryResults {
        if !self.owns(storage_id, repository_id) {
            return QueryResults::empty();
        }
        QueryResults::new(self.snapshot(), predicate)
    }

    fn clear(&mut self, storage_id: &str, repository_id: &str) -> CoreResult<()> {
        if !self.owns(storage_id, repository_id) || self.entries.is_empty() {
            return Ok(());
        }
        self.record(JournalRecord::Clear)
    }

    fn flush(&mut self) -> CoreResult<()> {
        if self.rewrite_pending || self.policy.is_due(self.journal_records, self.entries.len()) {
            self.compact()?;
        }
        self.backend
            .flush()
            .and_then(|()| self.backend.sync())
            .map_err(|e| CoreError::persistence(&self.key, e))?;
        self.dirty = false;
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl std::fmt::Debug for JournaledIndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournaledIndexStore")
            .field("key", &self.key)
            .field("entries", &self.entries.len())
            .field("journal_records", &self.journal_records)
            .field("dirty", &self.dirty)
            .field("ordering", &self.ordering.name())
            .finish()
    }
}
