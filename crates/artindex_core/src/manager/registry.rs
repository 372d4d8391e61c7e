//! Per-repository slots and open handles.

use crate::config::RepositoryConfig;
use crate::error::{CoreError, CoreResult};
use crate::index::{IndexStore, Predicate, QueryResults};
use crate::metadata::MetadataGenerator;
use crate::types::RepositoryKey;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Coordination state of one repository.
///
/// Lock order: `gate`, then `handle`, then the handle's store, with
/// `metadata` taken after `gate`.
#[derive(Default)]
pub(crate) struct RepositorySlot {
    /// Shared by deploys and queries, exclusive for rebuilds, close and
    /// delete.
    pub gate: RwLock<()>,
    /// The open handle, if any. Guards handle creation.
    pub handle: Mutex<Option<Arc<RepositoryIndexHandle>>>,
    /// Set for the duration of a rebuild.
    pub rebuilding: AtomicBool,
    /// Serializes metadata regeneration between concurrent deploys.
    pub metadata: Mutex<()>,
}

impl RepositorySlot {
    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<Arc<RepositoryIndexHandle>> {
        self.handle.lock().clone()
    }
}

/// Clears the rebuilding flag on every exit path.
pub(crate) struct RebuildingGuard<'a>(&'a AtomicBool);

impl<'a> RebuildingGuard<'a> {
    pub fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RebuildingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Registry of repository slots. Slots are created on first use and pruned
/// once they hold no handle and nobody else references them.
#[derive(Default)]
pub(crate) struct HandleRegistry {
    slots: Mutex<HashMap<RepositoryKey, Arc<RepositorySlot>>>,
}

impl HandleRegistry {
    /// Returns the slot of `key`, creating it if needed.
    pub fn slot(&self, key: &RepositoryKey) -> Arc<RepositorySlot> {
        Arc::clone(self.slots.lock().entry(key.clone()).or_default())
    }

    /// Returns the slot of `key` if one exists.
    pub fn peek(&self, key: &RepositoryKey) -> Option<Arc<RepositorySlot>> {
        self.slots.lock().get(key).cloned()
    }

    /// Drops the slot of `key` if it is idle: no open handle, no rebuild
    /// and no reference outside the registry.
    pub fn prune(&self, key: &RepositoryKey) {
        let mut slots = self.slots.lock();
        let idle = slots.get(key).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && !slot.is_rebuilding() && slot.handle.lock().is_none()
        });
        if idle {
            slots.remove(key);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Keys with an open handle, optionally restricted to one storage, sorted.
    pub fn open_keys(&self, storage_id: Option<&str>) -> Vec<RepositoryKey> {
        let mut keys: Vec<RepositoryKey> = self
            .slots
            .lock()
            .iter()
            .filter(|(key, _)| storage_id.map_or(true, |s| key.in_storage(s)))
            .filter(|(_, slot)| slot.handle.lock().is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

/// The open index of one repository.
///
/// At most one handle exists per repository; every caller opening the same
/// repository shares it. A repository with indexing disabled gets a handle
/// without a store.
pub struct RepositoryIndexHandle {
    key: RepositoryKey,
    config: RepositoryConfig,
    generator: MetadataGenerator,
    store: RwLock<Option<Box<dyn IndexStore>>>,
}

impl RepositoryIndexHandle {
    pub(crate) fn new(
        key: RepositoryKey,
        config: RepositoryConfig,
        generator: MetadataGenerator,
        store: Option<Box<dyn IndexStore>>,
    ) -> Self {
        Self {
            key,
            config,
            generator,
            store: RwLock::new(store),
        }
    }

    /// Repository of this handle.
    #[must_use]
    pub fn key(&self) -> &RepositoryKey {
        &self.key
    }

    /// Configuration the handle was opened with.
    #[must_use]
    pub fn config(&self) -> RepositoryConfig {
        self.config
    }

    /// Returns true if the repository keeps a search index.
    #[must_use]
    pub fn indexing_enabled(&self) -> bool {
        self.config.indexing_enabled
    }

    /// Number of indexed entries; zero when indexing is disabled.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.store.read().as_ref().map_or(0, |store| store.len())
    }

    pub(crate) fn generator(&self) -> &MetadataGenerator {
        &self.generator
    }

    fn unavailable(&self) -> CoreError {
        if self.config.indexing_enabled {
            CoreError::invalid_operation(format!("index of {} is closed", self.key))
        } else {
            CoreError::IndexingDisabled {
                repository: self.key.clone(),
            }
        }
    }

    pub(crate) fn query(&self, predicate: &Predicate) -> CoreResult<QueryResults> {
        let store = self.store.read();
        let store = store.as_ref().ok_or_else(|| self.unavailable())?;
        Ok(store.query(&self.key.storage_id, &self.key.repository_id, predicate))
    }

    pub(crate) fn with_store_mut<R>(
        &self,
        f: impl FnOnce(&mut dyn IndexStore) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let mut store = self.store.write();
        match store.as_mut() {
            Some(store) => f(store.as_mut()),
            None => Err(self.unavailable()),
        }
    }

    /// Flushes the store, retrying once on a persistence error.
    pub(crate) fn flush(&self) -> CoreResult<()> {
        let mut store = self.store.write();
        let Some(store) = store.as_mut() else {
            return Ok(());
        };
        match store.flush() {
            Err(e) if e.is_persistence() => {
                tracing::warn!(repository = %self.key, error = %e, "index flush failed, retrying");
                store.flush()
            }
            result => result,
        }
    }

    /// Flushes and drops the store. On failure the store stays open.
    pub(crate) fn release(&self) -> CoreResult<()> {
        self.flush()?;
        self.store.write().take();
        Ok(())
    }
}

impl std::fmt::Debug for RepositoryIndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryIndexHandle")
            .field("key", &self.key)
            .field("config", &self.config)
            .field("entries", &self.entry_count())
            .finish()
    }
}
