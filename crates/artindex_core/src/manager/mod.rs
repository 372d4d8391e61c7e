//! The repository index manager.
//!
//! Owns one [`RepositoryIndexHandle`] per open repository and coordinates
//! deploys, rebuilds, queries and lifecycle changes against it.
//!
//! # Locking
//!
//! Every repository has its own gate:
//!
//! - `record_deploy` and `query` hold it shared
//! - `rebuild`, `rebuild_metadata`, `close_index` and `delete_index` hold it
//!   exclusively
//!
//! Unrelated repositories never contend. Blocked acquisitions wake up every
//! [`ManagerConfig::lock_poll_interval`] to check their cancellation token,
//! and guards release the gate on every exit path.

mod rebuild;
mod registry;

pub use registry::RepositoryIndexHandle;

use crate::cancel::CancellationToken;
use crate::config::{ConfigurationProvider, ManagerConfig, StaticConfiguration};
use crate::coordinate::{self, Coordinate};
use crate::error::{CoreError, CoreResult, RebuildReport};
use crate::index::{CompactionPolicy, FileIndexStoreFactory, IndexEntry, IndexStoreFactory, Predicate, QueryResults};
use crate::layout::{FsStorageLayout, StorageLayout};
use crate::metadata::{read_metadata, store_metadata, ArtifactMetadata, MetadataGenerator};
use crate::types::{IndexState, RepositoryKey};
use crate::walk;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use registry::{HandleRegistry, RepositorySlot};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Coordinates index handles, rebuilds and metadata of every repository.
pub struct RepositoryIndexManager {
    config: ManagerConfig,
    layout: Arc<dyn StorageLayout>,
    configuration: Arc<dyn ConfigurationProvider>,
    factory: Arc<dyn IndexStoreFactory>,
    registry: HandleRegistry,
}

impl RepositoryIndexManager {
    /// Creates a manager from its collaborators.
    pub fn new(
        config: ManagerConfig,
        layout: Arc<dyn StorageLayout>,
        configuration: Arc<dyn ConfigurationProvider>,
        factory: Arc<dyn IndexStoreFactory>,
    ) -> Self {
        Self {
            config,
            layout,
            configuration,
            factory,
            registry: HandleRegistry::default(),
        }
    }

    /// Creates a manager over the storages below `base`, with journal files
    /// inside each repository.
    pub fn for_directory(
        base: impl Into<PathBuf>,
        config: ManagerConfig,
        configuration: Arc<dyn ConfigurationProvider>,
    ) -> Self {
        let factory = FileIndexStoreFactory::new(CompactionPolicy {
            ratio: config.compaction_ratio,
            min_records: config.compaction_min_records,
        });
        Self::new(
            config,
            Arc::new(FsStorageLayout::new(base)),
            configuration,
            Arc::new(factory),
        )
    }

    /// Creates a manager over `base` with default settings for every
    /// repository.
    pub fn open(base: impl Into<PathBuf>) -> Self {
        Self::for_directory(base, ManagerConfig::default(), Arc::new(StaticConfiguration::new()))
    }

    /// Returns the manager configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns the storage layout.
    #[must_use]
    pub fn layout(&self) -> &Arc<dyn StorageLayout> {
        &self.layout
    }

    // ---- lifecycle ----

    /// Opens the index of a repository, or returns the handle already open.
    ///
    /// Concurrent callers for the same repository receive the same handle;
    /// the underlying store is opened once.
    ///
    /// # Errors
    ///
    /// Returns `IndexLocked` or `IndexPersistence` if the store cannot be
    /// opened, and `InvalidOperation` if the repository root is missing and
    /// may not be created.
    pub fn open_index(
        &self,
        storage_id: &str,
        repository_id: &str,
    ) -> CoreResult<Arc<RepositoryIndexHandle>> {
        let key = RepositoryKey::new(storage_id, repository_id);
        let create = self.config.create_if_missing;
        let result = self.ensure_open(&key, &self.registry.slot(&key), create);
        self.registry.prune(&key);
        result
    }

    /// Returns the open handle of `key`, opening it first if needed. A
    /// missing repository root is created only if `create` is set.
    fn ensure_open(
        &self,
        key: &RepositoryKey,
        slot: &RepositorySlot,
        create: bool,
    ) -> CoreResult<Arc<RepositoryIndexHandle>> {
        let mut current = slot.handle.lock();
        if let Some(handle) = current.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let root = self.layout.repository_root(key);
        if !root.is_dir() {
            if !create {
                return Err(CoreError::invalid_operation(format!(
                    "repository root of {key} does not exist: {}",
                    root.display()
                )));
            }
            fs::create_dir_all(&root)?;
        }

        let repository = self.configuration.repository_config(key);
        let ordering = repository.version_ordering.build();
        let store = if repository.indexing_enabled {
            Some(self.factory.open(key, &root, Arc::clone(&ordering))?)
        } else {
            None
        };

        let handle = Arc::new(RepositoryIndexHandle::new(
            key.clone(),
            repository,
            MetadataGenerator::new(ordering),
            store,
        ));
        *current = Some(Arc::clone(&handle));

        tracing::info!(
            repository = %key,
            indexing = repository.indexing_enabled,
            entries = handle.entry_count(),
            "index opened"
        );
        Ok(handle)
    }

    /// Flushes and releases the index of a repository. Closing a closed
    /// index does nothing.
    ///
    /// # Errors
    ///
    /// Returns `IndexBusy` while a rebuild runs, and `IndexPersistence` if
    /// the final flush fails (the index then stays open).
    pub fn close_index(&self, storage_id: &str, repository_id: &str) -> CoreResult<()> {
        let key = RepositoryKey::new(storage_id, repository_id);
        let Some(slot) = self.registry.peek(&key) else {
            return Ok(());
        };
        let result = self
            .exclusive_unless_rebuilding(&key, &slot)
            .and_then(|_gate| Self::release(&key, &slot));
        drop(slot);
        self.registry.prune(&key);
        result
    }

    fn release(key: &RepositoryKey, slot: &RepositorySlot) -> CoreResult<()> {
        let mut current = slot.handle.lock();
        if let Some(handle) = current.as_ref() {
            handle.release()?;
            *current = None;
            tracing::info!(repository = %key, "index closed");
        }
        Ok(())
    }

    /// Closes every open index of `storage_id`.
    ///
    /// Every index is attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by [`Self::close_index`].
    pub fn close_storage(&self, storage_id: &str) -> CoreResult<()> {
        self.close_keys(self.registry.open_keys(Some(storage_id)))
    }

    /// Closes every open index of the process.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by [`Self::close_index`].
    pub fn close_all(&self) -> CoreResult<()> {
        self.close_keys(self.registry.open_keys(None))
    }

    fn close_keys(&self, keys: Vec<RepositoryKey>) -> CoreResult<()> {
        let mut first = None;
        for key in keys {
            if let Err(e) = self.close_index(&key.storage_id, &key.repository_id) {
                tracing::warn!(repository = %key, error = %e, "failed to close index");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Closes the index of a repository and deletes its persisted files.
    /// Metadata documents are left in place.
    ///
    /// # Errors
    ///
    /// Returns `IndexBusy` while a rebuild runs, or the error raised while
    /// closing or deleting.
    pub fn delete_index(&self, storage_id: &str, repository_id: &str) -> CoreResult<()> {
        let key = RepositoryKey::new(storage_id, repository_id);
        let result = {
            let slot = self.registry.slot(&key);
            let result = self
                .exclusive_unless_rebuilding(&key, &slot)
                .and_then(|_gate| Self::release(&key, &slot));
            result
        };
        self.registry.prune(&key);
        result?;
        self.factory.remove(&key, &self.layout.repository_root(&key))
    }

    /// Returns the lifecycle state of a repository index.
    #[must_use]
    pub fn state(&self, storage_id: &str, repository_id: &str) -> IndexState {
        let key = RepositoryKey::new(storage_id, repository_id);
        match self.registry.peek(&key) {
            Some(slot) if slot.is_rebuilding() => IndexState::Rebuilding,
            Some(slot) if slot.current().is_some() => IndexState::Open,
            _ => IndexState::Closed,
        }
    }

    // ---- deploys ----

    /// Records a newly stored artifact file: indexes it and regenerates the
    /// metadata of its artifact.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPath` if the path does not encode a coordinate,
    /// `IndexPersistence` if the entry cannot be recorded and
    /// `MetadataGeneration` if the metadata cannot be regenerated.
    pub fn record_deploy(
        &self,
        storage_id: &str,
        repository_id: &str,
        relative_path: &str,
    ) -> CoreResult<Coordinate> {
        self.record_deploy_with_cancel(
            storage_id,
            repository_id,
            relative_path,
            &CancellationToken::new(),
        )
    }

    /// [`Self::record_deploy`] that gives up waiting for a running rebuild
    /// once `cancel` fires.
    ///
    /// # Errors
    ///
    /// As [`Self::record_deploy`], plus `Interrupted` when cancelled while
    /// blocked.
    pub fn record_deploy_with_cancel(
        &self,
        storage_id: &str,
        repository_id: &str,
        relative_path: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<Coordinate> {
        let key = RepositoryKey::new(storage_id, repository_id);
        let relative_path = walk::normalize_scope(Some(relative_path));
        let coordinate = coordinate::extract(&relative_path)?;
        let artifact_path = walk::artifact_path_of(&relative_path).ok_or_else(|| {
            CoreError::malformed_path(&relative_path, "not inside an artifact directory")
        })?;

        let result = self.deploy_in_slot(
            &key,
            &self.registry.slot(&key),
            &coordinate,
            &relative_path,
            &artifact_path,
            cancel,
        );
        self.registry.prune(&key);
        result?;

        tracing::debug!(repository = %key, coordinate = %coordinate, "deploy recorded");
        Ok(coordinate)
    }

    fn deploy_in_slot(
        &self,
        key: &RepositoryKey,
        slot: &RepositorySlot,
        coordinate: &Coordinate,
        relative_path: &str,
        artifact_path: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        let _gate = self.shared(slot, cancel, "deploy")?;
        let handle = self.ensure_open(key, slot, self.config.create_if_missing)?;

        if handle.indexing_enabled() {
            let entry = IndexEntry::new(key, coordinate.clone(), relative_path);
            handle.with_store_mut(|store| store.add(entry))?;
        }

        let _metadata = slot.metadata.lock();
        self.regenerate_metadata(key, &handle, artifact_path)?;
        Ok(())
    }

    // ---- rebuilds ----

    /// Rebuilds index entries and metadata.
    ///
    /// - `repository_id == None` rebuilds every repository of the storage
    /// - `scope == None` rebuilds the whole repository
    /// - otherwise only the artifact files below `scope` are reindexed
    ///
    /// # Errors
    ///
    /// Returns `Rebuild` listing every failed artifact group after the whole
    /// scope was attempted, or the persistence error that stopped the
    /// rebuild.
    pub fn rebuild(
        &self,
        storage_id: &str,
        repository_id: Option<&str>,
        scope: Option<&str>,
    ) -> CoreResult<RebuildReport> {
        self.rebuild_with_cancel(storage_id, repository_id, scope, &CancellationToken::new())
    }

    /// [`Self::rebuild`] that stops between artifact groups once `cancel`
    /// fires.
    ///
    /// # Errors
    ///
    /// As [`Self::rebuild`], plus `RebuildCancelled` carrying the report of
    /// what was applied before stopping.
    pub fn rebuild_with_cancel(
        &self,
        storage_id: &str,
        repository_id: Option<&str>,
        scope: Option<&str>,
        cancel: &CancellationToken,
    ) -> CoreResult<RebuildReport> {
        self.run_rebuild(storage_id, repository_id, scope, cancel, rebuild::Mode::Full)
    }

    /// Regenerates metadata only, with the scopes of [`Self::rebuild`]. The
    /// index is not touched.
    ///
    /// # Errors
    ///
    /// As [`Self::rebuild`].
    pub fn rebuild_metadata(
        &self,
        storage_id: &str,
        repository_id: Option<&str>,
        scope: Option<&str>,
    ) -> CoreResult<RebuildReport> {
        self.run_rebuild(
            storage_id,
            repository_id,
            scope,
            &CancellationToken::new(),
            rebuild::Mode::MetadataOnly,
        )
    }

    // ---- reads ----

    /// Queries the index of a repository, opening it if needed.
    ///
    /// # Errors
    ///
    /// Returns `IndexingDisabled` for repositories without index,
    /// `InvalidOperation` if the repository root does not exist, and the
    /// error raised while opening the index, e.g. `IndexPersistence` for a
    /// corrupted journal.
    pub fn query(
        &self,
        storage_id: &str,
        repository_id: &str,
        predicate: &Predicate,
    ) -> CoreResult<QueryResults> {
        let key = RepositoryKey::new(storage_id, repository_id);
        // A query never creates a repository root.
        let result = {
            let slot = self.registry.slot(&key);
            let cancel = CancellationToken::new();
            let result = self
                .shared(&slot, &cancel, "query")
                .and_then(|_gate| self.ensure_open(&key, &slot, false)?.query(predicate));
            result
        };
        self.registry.prune(&key);
        result
    }

    /// Reads the stored metadata of `group_id:artifact_id`.
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error if the document is unreadable.
    pub fn metadata(
        &self,
        storage_id: &str,
        repository_id: &str,
        group_id: &str,
        artifact_id: &str,
    ) -> CoreResult<Option<ArtifactMetadata>> {
        let key = RepositoryKey::new(storage_id, repository_id);
        let dir = self
            .layout
            .repository_root(&key)
            .join(group_id.replace('.', "/"))
            .join(artifact_id);
        read_metadata(&dir)
    }

    // ---- helpers ----

    /// Regenerates and stores the metadata of the artifact directory
    /// `artifact_path` from a full scan. Returns whether the file changed.
    fn regenerate_metadata(
        &self,
        key: &RepositoryKey,
        handle: &RepositoryIndexHandle,
        artifact_path: &str,
    ) -> CoreResult<bool> {
        let (group_path, artifact_id) = artifact_path.rsplit_once('/').ok_or_else(|| {
            CoreError::metadata(artifact_path, "not a group/artifact directory")
        })?;
        if group_path.split('/').any(|segment| segment.contains('.')) {
            return Err(CoreError::metadata(
                artifact_path,
                "group directories must not contain '.'",
            ));
        }
        let group_id = group_path.replace('/', ".");

        let directories = walk::version_directories(self.layout.as_ref(), key, artifact_path)?;
        let metadata = handle
            .generator()
            .regenerate(key, &group_id, artifact_id, &directories)?;

        let dir = self.layout.repository_root(key).join(artifact_path);
        store_metadata(&dir, &metadata)
            .map_err(|e| CoreError::metadata(format!("{group_id}:{artifact_id}"), e.to_string()))
    }

    fn shared<'a>(
        &self,
        slot: &'a RepositorySlot,
        cancel: &CancellationToken,
        operation: &'static str,
    ) -> CoreResult<RwLockReadGuard<'a, ()>> {
        loop {
            if let Some(guard) = slot.gate.try_read_for(self.config.lock_poll_interval) {
                return Ok(guard);
            }
            if cancel.is_cancelled() {
                return Err(CoreError::Interrupted { operation });
            }
        }
    }

    fn exclusive<'a>(
        &self,
        slot: &'a RepositorySlot,
        cancel: &CancellationToken,
        operation: &'static str,
    ) -> CoreResult<RwLockWriteGuard<'a, ()>> {
        loop {
            if let Some(guard) = slot.gate.try_write_for(self.config.lock_poll_interval) {
                return Ok(guard);
            }
            if cancel.is_cancelled() {
                return Err(CoreError::Interrupted { operation });
            }
        }
    }

    /// Takes the gate exclusively, failing with `IndexBusy` instead of
    /// waiting for a rebuild.
    fn exclusive_unless_rebuilding<'a>(
        &self,
        key: &RepositoryKey,
        slot: &'a RepositorySlot,
    ) -> CoreResult<RwLockWriteGuard<'a, ()>> {
        let busy = || CoreError::IndexBusy {
            repository: key.clone(),
        };
        loop {
            if slot.is_rebuilding() {
                return Err(busy());
            }
            if let Some(guard) = slot.gate.try_write_for(self.config.lock_poll_interval) {
                // A rebuild that queued before us may have just finished.
                if slot.is_rebuilding() {
                    return Err(busy());
                }
                return Ok(guard);
            }
        }
    }
}

impl Drop for RepositoryIndexManager {
    fn drop(&mut self) {
        if let Err(e) = self.close_all() {
            tracing::warn!(error = %e, "indexes left open at shutdown");
        }
    }
}

impl std::fmt::Debug for RepositoryIndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryIndexManager")
            .field("config", &self.config)
            .field("open", &self.registry.open_keys(None))
            .finish()
    }
}
