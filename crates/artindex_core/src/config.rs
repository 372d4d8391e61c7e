//! Manager and per-repository configuration.

use crate::types::RepositoryKey;
use crate::version::VersionOrderingKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for a [`crate::RepositoryIndexManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// How long a blocked lock acquisition waits before re-checking its
    /// cancellation token.
    pub lock_poll_interval: Duration,

    /// `flush` compacts a journal holding more than this many records per
    /// live entry.
    pub compaction_ratio: usize,

    /// Journals with fewer records than this are never compacted.
    pub compaction_min_records: usize,

    /// Whether opening an index creates a missing repository root.
    pub create_if_missing: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            lock_poll_interval: Duration::from_millis(50),
            compaction_ratio: 2,
            compaction_min_records: 1024,
            create_if_missing: true,
        }
    }
}

impl ManagerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lock poll interval.
    #[must_use]
    pub const fn lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }

    /// Sets the journal compaction ratio.
    #[must_use]
    pub const fn compaction_ratio(mut self, ratio: usize) -> Self {
        self.compaction_ratio = ratio;
        self
    }

    /// Sets the minimum journal size considered for compaction.
    #[must_use]
    pub const fn compaction_min_records(mut self, records: usize) -> Self {
        self.compaction_min_records = records;
        self
    }

    /// Sets whether missing repository roots are created.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}

/// Per-repository settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RepositoryConfig {
    /// Whether the repository keeps a search index. Metadata is maintained
    /// either way.
    pub indexing_enabled: bool,
    /// Ordering rule for version lists and query results.
    pub version_ordering: VersionOrderingKind,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            indexing_enabled: true,
            version_ordering: VersionOrderingKind::NumericAware,
        }
    }
}

/// Supplies per-repository configuration.
pub trait ConfigurationProvider: Send + Sync {
    /// Returns the configuration of `key`.
    fn repository_config(&self, key: &RepositoryKey) -> RepositoryConfig;
}

/// A fixed configuration: one default plus per-repository overrides.
///
/// Deserializes from JSON such as:
///
/// ```json
/// {
///   "default": { "indexing-enabled": true },
///   "repositories": {
///     "storage0:snapshots": { "version-ordering": "lexicographic" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfiguration {
    /// Applies to repositories without an override.
    pub default: RepositoryConfig,
    /// Overrides keyed by `storageId:repositoryId`.
    pub repositories: HashMap<String, RepositoryConfig>,
}

impl StaticConfiguration {
    /// Creates a configuration where every repository uses the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an override for one repository.
    #[must_use]
    pub fn with_repository(mut self, key: &RepositoryKey, config: RepositoryConfig) -> Self {
        self.repositories.insert(key.to_string(), config);
        self
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the document is invalid.
    pub fn from_json(data: &str) -> crate::CoreResult<Self> {
        serde_json::from_str(data).map_err(|e| crate::CoreError::serialization(e.to_string()))
    }
}

impl ConfigurationProvider for StaticConfiguration {
    fn repository_config(&self, key: &RepositoryKey) -> RepositoryConfig {
        self.repositories
            .get(&key.to_string())
            .copied()
            .unwrap_or(self.default)
    }
}
