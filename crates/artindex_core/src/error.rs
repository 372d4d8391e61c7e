//! Error types for artindex core.

use crate::types::RepositoryKey;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in index and metadata operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A storage path does not follow the `group/artifact/version/file` layout.
    #[error("malformed artifact path {path:?}: {reason}")]
    MalformedPath {
        /// The offending relative path.
        path: String,
        /// What did not match.
        reason: String,
    },

    /// The index journal could not be read, written or flushed.
    #[error("index persistence failed for {repository}: {source}")]
    IndexPersistence {
        /// Repository whose index failed.
        repository: RepositoryKey,
        /// Underlying storage error.
        #[source]
        source: artindex_storage::StorageError,
    },

    /// Metadata for one artifact could not be derived or written.
    #[error("metadata generation failed for {artifact}: {reason}")]
    MetadataGeneration {
        /// `groupId:artifactId` or the artifact directory.
        artifact: String,
        /// Description of the failure.
        reason: String,
    },

    /// A rebuild attempted every artifact group and some of them failed.
    #[error(transparent)]
    Rebuild(#[from] RebuildError),

    /// The repository is being rebuilt and cannot be closed.
    #[error("index for {repository} is busy rebuilding")]
    IndexBusy {
        /// Repository being rebuilt.
        repository: RepositoryKey,
    },

    /// A rebuild stopped at a cancellation request.
    #[error("rebuild cancelled after {} of {} artifact groups", .report.groups_completed, .report.groups_total)]
    RebuildCancelled {
        /// What was applied before the rebuild stopped.
        report: RebuildReport,
    },

    /// A blocked operation gave up waiting after a cancellation request.
    #[error("{operation} interrupted while waiting for the repository lock")]
    Interrupted {
        /// The interrupted operation.
        operation: &'static str,
    },

    /// Another handle (possibly in another process) holds the index directory.
    #[error("index directory locked: {path}")]
    IndexLocked {
        /// The locked index directory.
        path: String,
    },

    /// Indexing is switched off for the repository.
    #[error("indexing is disabled for {repository}")]
    IndexingDisabled {
        /// The repository.
        repository: RepositoryKey,
    },

    /// A query string could not be parsed.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is invalid.
        message: String,
    },

    /// Encoding or decoding of a persisted document failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// I/O error outside the index journal (directory walks, metadata files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates a malformed path error.
    pub fn malformed_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wraps a storage error for the given repository.
    pub fn persistence(
        repository: &RepositoryKey,
        source: impl Into<artindex_storage::StorageError>,
    ) -> Self {
        Self::IndexPersistence {
            repository: repository.clone(),
            source: source.into(),
        }
    }

    /// Creates a metadata generation error.
    pub fn metadata(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MetadataGeneration {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns true for errors raised by the index journal.
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::IndexPersistence { .. })
    }
}

/// Counters describing what a rebuild applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Repositories visited.
    pub repositories: usize,
    /// Artifact groups discovered across all visited repositories.
    pub groups_total: usize,
    /// Artifact groups fully processed (successfully or not).
    pub groups_completed: usize,
    /// Index entries written.
    pub entries_indexed: usize,
    /// Metadata documents written or removed.
    pub metadata_written: usize,
}

impl RebuildReport {
    pub(crate) fn absorb(&mut self, other: &RebuildReport) {
        self.repositories += other.repositories;
        self.groups_total += other.groups_total;
        self.groups_completed += other.groups_completed;
        self.entries_indexed += other.entries_indexed;
        self.metadata_written += other.metadata_written;
    }
}

/// The failure of one artifact group during a rebuild.
#[derive(Debug)]
pub struct GroupFailure {
    /// Repository the group belongs to.
    pub repository: RepositoryKey,
    /// Artifact directory, relative to the repository root.
    pub artifact_path: String,
    /// Every error raised while processing the group.
    pub errors: Vec<CoreError>,
}

impl fmt::Display for GroupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: ", self.repository, self.artifact_path)?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// Aggregate error returned after a rebuild attempted its whole scope.
#[derive(Debug, Error)]
#[error("rebuild failed for {} artifact group(s): {}", .failures.len(), summarize(.failures))]
pub struct RebuildError {
    /// Per-group failures, in processing order.
    pub failures: Vec<GroupFailure>,
    /// What was applied despite the failures.
    pub report: RebuildReport,
}

impl RebuildError {
    /// Returns the artifact paths of the failed groups.
    #[must_use]
    pub fn failed_paths(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|failure| failure.artifact_path.as_str())
            .collect()
    }
}

fn summarize(failures: &[GroupFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuild_error_lists_groups() {
        let key = RepositoryKey::new("storage0", "releases");
        let err = RebuildError {
            failures: vec![GroupFailure {
                repository: key.clone(),
                artifact_path: "org/example/broken".into(),
                errors: vec![CoreError::malformed_path("org/example/broken/1.0/x.jar", "bad name")],
            }],
            report: RebuildReport::default(),
        };

        assert_eq!(err.failed_paths(), vec!["org/example/broken"]);
        let message = err.to_string();
        assert!(message.contains("1 artifact group"));
        assert!(message.contains("storage0:releases/org/example/broken"));
    }

    #[test]
    fn persistence_classification() {
        let key = RepositoryKey::new("s", "r");
        let err = CoreError::persistence(&key, artindex_storage::StorageError::Corrupted("crc".into()));
        assert!(err.is_persistence());
        assert!(!CoreError::invalid_query("x").is_persistence());
    }
}
