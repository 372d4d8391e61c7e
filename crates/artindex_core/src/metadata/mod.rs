//! Per-artifact aggregate metadata.
//!
//! [`ArtifactMetadata`] is always derived from a full scan of an artifact
//! directory by the [`MetadataGenerator`]; it is never patched in place.
//! The manager persists it next to the version directories as
//! [`METADATA_FILE_NAME`].

mod file;
mod generator;

pub use file::{read_metadata, remove_metadata, store_metadata, write_metadata, METADATA_FILE_NAME};
pub use generator::{MetadataGenerator, VersionDirectory};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The newest timestamped build of one snapshot version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDescriptor {
    /// The `-SNAPSHOT` version.
    pub base_version: String,
    /// Highest build number observed.
    pub build_number: u32,
    /// Timestamp of that build, `yyyyMMdd.HHmmss`.
    pub timestamp: String,
}

/// Versions and pointers of one `groupId:artifactId` in one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    /// Group identifier.
    pub group_id: String,
    /// Artifact identifier.
    pub artifact_id: String,
    /// Known versions, ascending under the repository's version ordering.
    pub versions: Vec<String>,
    /// Greatest version, snapshot or not.
    pub latest_version: Option<String>,
    /// Greatest non-snapshot version.
    pub release_version: Option<String>,
    /// Snapshot descriptors keyed by `-SNAPSHOT` version.
    #[serde(default)]
    pub snapshot_descriptors: BTreeMap<String, SnapshotDescriptor>,
}

impl ArtifactMetadata {
    /// Returns true if no version of the artifact remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
