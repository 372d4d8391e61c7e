//! Scan-and-reconcile rebuilds.
//!
//! One repository is rebuilt in five steps while holding its gate
//! exclusively:
//!
//! 1. remove the index entries of the scope
//! 2. walk the scope
//! 3. index every artifact file found
//! 4. regenerate the metadata of every artifact group found
//! 5. flush the index
//!
//! A group whose files or metadata fail is recorded and the rebuild moves
//! on. Persistence errors stop the rebuild: the journal can no longer be
//! trusted and the next rebuild starts from scratch anyway.

use super::registry::{RebuildingGuard, RepositoryIndexHandle, RepositorySlot};
use super::RepositoryIndexManager;
use crate::cancel::CancellationToken;
use crate::coordinate;
use crate::error::{CoreError, CoreResult, GroupFailure, RebuildError, RebuildReport};
use crate::index::{IndexEntry, Predicate};
use crate::types::RepositoryKey;
use crate::walk::{self, ArtifactGroup};

/// What a rebuild reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Mode {
    /// Index entries and metadata.
    Full,
    /// Metadata only.
    MetadataOnly,
}

/// Result of rebuilding one repository.
struct Outcome {
    report: RebuildReport,
    failures: Vec<GroupFailure>,
}

impl RepositoryIndexManager {
    pub(super) fn run_rebuild(
        &self,
        storage_id: &str,
        repository_id: Option<&str>,
        scope: Option<&str>,
        cancel: &CancellationToken,
        mode: Mode,
    ) -> CoreResult<RebuildReport> {
        let scope = walk::normalize_scope(scope);

        let Some(repository_id) = repository_id else {
            return self.rebuild_storage(storage_id, &scope, cancel, mode);
        };

        let key = RepositoryKey::new(storage_id, repository_id);
        let outcome = self.rebuild_repository(&key, &scope, cancel, mode)?;
        finish(outcome.report, outcome.failures)
    }

    /// Rebuilds every repository of a storage in turn.
    fn rebuild_storage(
        &self,
        storage_id: &str,
        scope: &str,
        cancel: &CancellationToken,
        mode: Mode,
    ) -> CoreResult<RebuildReport> {
        let mut report = RebuildReport::default();
        let mut failures = Vec::new();

        for repository_id in self.layout.repository_ids(storage_id)? {
            let key = RepositoryKey::new(storage_id, &repository_id);
            match self.rebuild_repository(&key, scope, cancel, mode) {
                Ok(outcome) => {
                    report.absorb(&outcome.report);
                    failures.extend(outcome.failures);
                }
                Err(CoreError::RebuildCancelled { report: partial }) => {
                    report.absorb(&partial);
                    return Err(CoreError::RebuildCancelled { report });
                }
                Err(e) => {
                    tracing::warn!(repository = %key, error = %e, "repository rebuild failed");
                    failures.push(GroupFailure {
                        repository: key,
                        artifact_path: String::new(),
                        errors: vec![e],
                    });
                }
            }
        }

        finish(report, failures)
    }

    fn rebuild_repository(
        &self,
        key: &RepositoryKey,
        scope: &str,
        cancel: &CancellationToken,
        mode: Mode,
    ) -> CoreResult<Outcome> {
        let result = self.rebuild_in_slot(key, &self.registry.slot(key), scope, cancel, mode);
        self.registry.prune(key);
        result
    }

    fn rebuild_in_slot(
        &self,
        key: &RepositoryKey,
        slot: &RepositorySlot,
        scope: &str,
        cancel: &CancellationToken,
        mode: Mode,
    ) -> CoreResult<Outcome> {
        let _gate = match self.exclusive(slot, cancel, "rebuild") {
            Ok(gate) => gate,
            Err(CoreError::Interrupted { .. }) => {
                return Err(CoreError::RebuildCancelled {
                    report: RebuildReport::default(),
                });
            }
            Err(e) => return Err(e),
        };
        let _rebuilding = RebuildingGuard::set(&slot.rebuilding);
        let handle = self.ensure_open(key, slot, self.config.create_if_missing)?;
        let index = mode == Mode::Full && handle.indexing_enabled();

        let groups = walk::discover(self.layout.as_ref(), key, scope)?;
        let mut report = RebuildReport {
            repositories: 1,
            groups_total: groups.len(),
            ..RebuildReport::default()
        };
        let mut failures = Vec::new();

        tracing::info!(
            repository = %key,
            scope = %scope,
            groups = groups.len(),
            index,
            "rebuild started"
        );

        if index {
            clear_scope(&handle, key, scope)?;
        }

        for group in groups.values() {
            if cancel.is_cancelled() {
                handle.flush()?;
                tracing::info!(
                    repository = %key,
                    completed = report.groups_completed,
                    total = report.groups_total,
                    "rebuild cancelled"
                );
                return Err(CoreError::RebuildCancelled { report });
            }

            let mut errors = Vec::new();
            if index {
                report.entries_indexed += index_group(&handle, key, group, &mut errors)?;
            }
            match self.regenerate_metadata(key, &handle, &group.artifact_path) {
                Ok(changed) => report.metadata_written += usize::from(changed),
                Err(e) => errors.push(e),
            }
            report.groups_completed += 1;

            if !errors.is_empty() {
                tracing::warn!(
                    repository = %key,
                    artifact_path = %group.artifact_path,
                    errors = errors.len(),
                    "artifact group failed"
                );
                failures.push(GroupFailure {
                    repository: key.clone(),
                    artifact_path: group.artifact_path.clone(),
                    errors,
                });
            }
        }

        handle.flush()?;

        tracing::info!(
            repository = %key,
            entries = report.entries_indexed,
            metadata = report.metadata_written,
            failed = failures.len(),
            "rebuild finished"
        );
        Ok(Outcome { report, failures })
    }
}

fn finish(report: RebuildReport, failures: Vec<GroupFailure>) -> CoreResult<RebuildReport> {
    if failures.is_empty() {
        Ok(report)
    } else {
        Err(RebuildError { failures, report }.into())
    }
}

/// Removes the entries of `scope`, or every entry for the repository root.
fn clear_scope(handle: &RepositoryIndexHandle, key: &RepositoryKey, scope: &str) -> CoreResult<()> {
    handle.with_store_mut(|store| {
        if scope.is_empty() {
            return store.clear(&key.storage_id, &key.repository_id);
        }
        let stale: Vec<String> = store
            .query(&key.storage_id, &key.repository_id, &Predicate::any())
            .into_iter()
            .filter(|entry| entry.is_under(scope))
            .map(|entry| entry.relative_path)
            .collect();
        for path in stale {
            store.remove(&key.storage_id, &key.repository_id, &path)?;
        }
        Ok(())
    })
}

/// Indexes the files of `group`. Malformed paths are collected into
/// `errors`; persistence errors are returned.
fn index_group(
    handle: &RepositoryIndexHandle,
    key: &RepositoryKey,
    group: &ArtifactGroup,
    errors: &mut Vec<CoreError>,
) -> CoreResult<usize> {
    handle.with_store_mut(|store| {
        let mut indexed = 0;
        for path in &group.files {
            match coordinate::extract(path) {
                Ok(coordinate) => {
                    store.add(IndexEntry::new(key, coordinate, path.as_str()))?;
                    indexed += 1;
                }
                Err(e) => errors.push(e),
            }
        }
        Ok(indexed)
    })
}
