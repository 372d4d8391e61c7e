//! On-disk repository fixtures.
//!
//! A [`TestStorage`] is a temporary base directory laid out as
//! `<base>/<storageId>/<repositoryId>/...`, with helpers that create and
//! delete artifact files in the repository layout.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary storage base directory with automatic cleanup.
pub struct TestStorage {
    temp_dir: TempDir,
}

impl Default for TestStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed `groupId:artifactId:version[:extension][:classifier]` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gav {
    /// Group identifier.
    pub group_id: String,
    /// Artifact identifier.
    pub artifact_id: String,
    /// Version.
    pub version: String,
    /// File extension, `jar` unless given.
    pub extension: String,
    /// Optional classifier.
    pub classifier: Option<String>,
}

impl Gav {
    /// Parses `g:a:v[:ext][:classifier]`.
    ///
    /// # Panics
    ///
    /// Panics on fewer than three components.
    #[must_use]
    pub fn parse(gav: &str) -> Self {
        let parts: Vec<&str> = gav.split(':').collect();
        assert!(parts.len() >= 3, "expected g:a:v[:ext][:classifier], got {gav:?}");
        Self {
            group_id: parts[0].to_string(),
            artifact_id: parts[1].to_string(),
            version: parts[2].to_string(),
            extension: parts.get(3).copied().unwrap_or("jar").to_string(),
            classifier: parts.get(4).map(|c| c.to_string()),
        }
    }

    /// Artifact directory relative to the repository root.
    #[must_use]
    pub fn artifact_dir(&self) -> String {
        format!("{}/{}", self.group_id.replace('.', "/"), self.artifact_id)
    }

    fn file_name(&self, file_version: &str) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{file_version}-{classifier}.{}",
                self.artifact_id, self.extension
            ),
            None => format!("{}-{file_version}.{}", self.artifact_id, self.extension),
        }
    }
}

impl TestStorage {
    /// Creates an empty storage base in a temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the base directory holding every storage.
    #[must_use]
    pub fn base(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the root directory of a repository.
    #[must_use]
    pub fn repository_root(&self, storage_id: &str, repository_id: &str) -> PathBuf {
        self.base().join(storage_id).join(repository_id)
    }

    /// Writes `contents` at `relative_path` inside a repository, creating
    /// parent directories. Returns the relative path.
    ///
    /// # Panics
    ///
    /// Panics on I/O failure.
    pub fn write_file(
        &self,
        storage_id: &str,
        repository_id: &str,
        relative_path: &str,
        contents: &[u8],
    ) -> String {
        let path = self.repository_root(storage_id, repository_id).join(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create artifact directory");
        }
        fs::write(&path, contents).expect("Failed to write artifact file");
        relative_path.to_string()
    }

    /// Creates the artifact file for `gav` (`g:a:v[:ext][:classifier]`) and
    /// returns its relative path.
    pub fn generate_artifact(&self, storage_id: &str, repository_id: &str, gav: &str) -> String {
        let gav = Gav::parse(gav);
        let relative_path = format!(
            "{}/{}/{}",
            gav.artifact_dir(),
            gav.version,
            gav.file_name(&gav.version)
        );
        self.write_file(
            storage_id,
            repository_id,
            &relative_path,
            relative_path.as_bytes(),
        )
    }

    /// Creates one timestamped build of a snapshot version.
    ///
    /// `gav` names the `-SNAPSHOT` version; the file is written into that
    /// version directory as `artifactId-<base>-<timestamp>-<build>`.
    ///
    /// # Panics
    ///
    /// Panics if the version of `gav` does not end in `-SNAPSHOT`.
    pub fn generate_snapshot_build(
        &self,
        storage_id: &str,
        repository_id: &str,
        gav: &str,
        timestamp: &str,
        build_number: u32,
    ) -> String {
        let gav = Gav::parse(gav);
        let base = gav
            .version
            .strip_suffix("-SNAPSHOT")
            .expect("snapshot builds need a -SNAPSHOT version");
        let file_version = format!("{base}-{timestamp}-{build_number}");
        let relative_path = format!(
            "{}/{}/{}",
            gav.artifact_dir(),
            gav.version,
            gav.file_name(&file_version)
        );
        self.write_file(
            storage_id,
            repository_id,
            &relative_path,
            relative_path.as_bytes(),
        )
    }

    /// Deletes a file or directory inside a repository.
    ///
    /// # Panics
    ///
    /// Panics if the path does not exist or cannot be removed.
    pub fn remove(&self, storage_id: &str, repository_id: &str, relative_path: &str) {
        let path = self.repository_root(storage_id, repository_id).join(relative_path);
        if path.is_dir() {
            fs::remove_dir_all(&path).expect("Failed to remove directory");
        } else {
            fs::remove_file(&path).expect("Failed to remove file");
        }
    }

    /// Returns true if `relative_path` exists inside a repository.
    #[must_use]
    pub fn exists(&self, storage_id: &str, repository_id: &str, relative_path: &str) -> bool {
        self.repository_root(storage_id, repository_id)
            .join(relative_path)
            .exists()
    }

    /// Reads a file inside a repository.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be read.
    #[must_use]
    pub fn read(&self, storage_id: &str, repository_id: &str, relative_path: &str) -> Vec<u8> {
        fs::read(self.repository_root(storage_id, repository_id).join(relative_path))
            .expect("Failed to read file")
    }
}
