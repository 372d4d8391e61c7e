//! Metadata derivation from version directories.

use super::{ArtifactMetadata, SnapshotDescriptor};
use crate::coordinate::{self, is_snapshot_version, SnapshotBuild};
use crate::error::{CoreError, CoreResult};
use crate::types::RepositoryKey;
use crate::version::{sort_versions, VersionOrdering};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// The content of one version directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDirectory {
    /// Directory name, i.e. the version (`1.0`, `1.1-SNAPSHOT`).
    pub name: String,
    /// Names of the artifact files inside the directory.
    pub files: Vec<String>,
}

impl VersionDirectory {
    /// Creates a version directory listing.
    pub fn new(name: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            name: name.into(),
            files,
        }
    }
}

/// Derives [`ArtifactMetadata`] from a scan of version directories.
#[derive(Clone)]
pub struct MetadataGenerator {
    ordering: Arc<dyn VersionOrdering>,
}

impl MetadataGenerator {
    /// Creates a generator ordering versions with `ordering`.
    pub fn new(ordering: Arc<dyn VersionOrdering>) -> Self {
        Self { ordering }
    }

    /// Computes the metadata of `group_id:artifact_id` from `directories`.
    ///
    /// Directories without files are skipped. A file counts as recognizable
    /// when its name encodes this artifact and the directory's version.
    ///
    /// # Errors
    ///
    /// Returns `MetadataGeneration` if a directory holds files but none of
    /// them is recognizable.
    pub fn regenerate(
        &self,
        key: &RepositoryKey,
        group_id: &str,
        artifact_id: &str,
        directories: &[VersionDirectory],
    ) -> CoreResult<ArtifactMetadata> {
        let artifact_dir = format!("{}/{artifact_id}", group_id.replace('.', "/"));
        let mut versions = Vec::new();
        let mut snapshot_descriptors = BTreeMap::new();

        for dir in directories {
            if dir.files.is_empty() {
                continue;
            }

            let mut recognized = 0;
            let mut builds = BTreeSet::new();
            for file in &dir.files {
                let path = format!("{artifact_dir}/{}/{file}", dir.name);
                let Ok(coordinate) = coordinate::extract(&path) else {
                    continue;
                };
                if coordinate.group_id != group_id
                    || coordinate.artifact_id != artifact_id
                    || coordinate.base_version() != dir.name
                {
                    continue;
                }
                recognized += 1;
                if let Some(build) = SnapshotBuild::parse(&coordinate.version) {
                    builds.insert((build.build_number, build.timestamp));
                }
            }

            if recognized == 0 {
                return Err(CoreError::metadata(
                    format!("{group_id}:{artifact_id}"),
                    format!(
                        "version directory {} in {key} holds no recognizable artifact files",
                        dir.name
                    ),
                ));
            }

            if let Some((build_number, timestamp)) = builds.into_iter().next_back() {
                snapshot_descriptors.insert(
                    dir.name.clone(),
                    SnapshotDescriptor {
                        base_version: dir.name.clone(),
                        build_number,
                        timestamp,
                    },
                );
            }
            versions.push(dir.name.clone());
        }

        sort_versions(&mut versions, self.ordering.as_ref());
        versions.dedup();

        let latest_version = versions.last().cloned();
        let release_version = versions
            .iter()
            .rev()
            .find(|v| !is_snapshot_version(v))
            .cloned();

        tracing::trace!(
            repository = %key,
            artifact = %format!("{group_id}:{artifact_id}"),
            versions = versions.len(),
            "metadata regenerated"
        );

        Ok(ArtifactMetadata {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            versions,
            latest_version,
            release_version,
            snapshot_descriptors,
        })
    }
}

impl std::fmt::Debug for MetadataGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataGenerator")
            .field("ordering", &self.ordering.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{LexicographicOrdering, NumericAwareOrdering};

    fn key() -> RepositoryKey {
        RepositoryKey::new("storage0", "releases")
    }

    fn dir(version: &str, files: &[&str]) -> VersionDirectory {
        VersionDirectory::new(version, files.iter().map(|f| f.to_string()).collect())
    }

    fn release(version: &str) -> VersionDirectory {
        dir(version, &[&format!("lib-{version}.jar"), &format!("lib-{version}.pom")])
    }

    #[test]
    fn orders_versions_numerically() {
        let generator = MetadataGenerator::new(Arc::new(NumericAwareOrdering));
        let metadata = generator
            .regenerate(
                &key(),
                "com.example",
                "lib",
                &[
                    dir("2.0-SNAPSHOT", &["lib-2.0-SNAPSHOT.jar"]),
                    release("1.10"),
                    release("1.0"),
                    release("1.2"),
                ],
            )
            .unwrap();

        assert_eq!(metadata.versions, vec!["1.0", "1.2", "1.10", "2.0-SNAPSHOT"]);
        assert_eq!(metadata.release_version.as_deref(), Some("1.10"));
        assert_eq!(metadata.latest_version.as_deref(), Some("2.0-SNAPSHOT"));
        assert!(metadata.snapshot_descriptors.is_empty());
    }

    #[test]
    fn lexicographic_rule_is_honoured() {
        let generator = MetadataGenerator::new(Arc::new(LexicographicOrdering));
        let metadata = generator
            .regenerate(&key(), "com.example", "lib", &[release("1.10"), release("1.2")])
            .unwrap();
        assert_eq!(metadata.versions, vec!["1.10", "1.2"]);
    }

    #[test]
    fn snapshot_descriptor_tracks_highest_build() {
        let generator = MetadataGenerator::new(Arc::new(NumericAwareOrdering));
        let metadata = generator
            .regenerate(
                &key(),
                "com.example",
                "lib",
                &[
                    release("1.0"),
                    dir(
                        "1.1-SNAPSHOT",
                        &[
                            "lib-1.1-20230101.130000-2.jar",
                            "lib-1.1-20230101.120000-1.jar",
                            "lib-1.1-20230101.120000-1.pom",
                            "lib-1.1-20230101.130000-2-sources.jar",
                        ],
                    ),
                ],
            )
            .unwrap();

        assert_eq!(metadata.versions, vec!["1.0", "1.1-SNAPSHOT"]);
        assert_eq!(metadata.release_version.as_deref(), Some("1.0"));
        let descriptor = &metadata.snapshot_descriptors["1.1-SNAPSHOT"];
        assert_eq!(descriptor.build_number, 2);
        assert_eq!(descriptor.timestamp, "20230101.130000");
    }

    #[test]
    fn empty_directories_are_skipped() {
        let generator = MetadataGenerator::new(Arc::new(NumericAwareOrdering));
        let metadata = generator
            .regenerate(&key(), "com.example", "lib", &[dir("1.0", &[]), release("1.1")])
            .unwrap();
        assert_eq!(metadata.versions, vec!["1.1"]);

        let metadata = generator
            .regenerate(&key(), "com.example", "lib", &[dir("1.0", &[])])
            .unwrap();
        assert!(metadata.is_empty());
        assert_eq!(metadata.latest_version, None);
    }

    #[test]
    fn unrecognizable_directory_fails() {
        let generator = MetadataGenerator::new(Arc::new(NumericAwareOrdering));
        let result = generator.regenerate(
            &key(),
            "com.example",
            "lib",
            &[release("1.0"), dir("1.1", &["other-1.1.jar", "notes.txt"])],
        );
        assert!(matches!(result, Err(CoreError::MetadataGeneration { .. })));
    }

    #[test]
    fn only_snapshots_has_no_release() {
        let generator = MetadataGenerator::new(Arc::new(NumericAwareOrdering));
        let metadata = generator
            .regenerate(
                &key(),
                "com.example",
                "lib",
                &[dir("1.0-SNAPSHOT", &["lib-1.0-SNAPSHOT.jar"])],
            )
            .unwrap();
        assert_eq!(metadata.release_version, None);
        assert_eq!(metadata.latest_version.as_deref(), Some("1.0-SNAPSHOT"));
    }
}
