//! Discovery of artifact files below a rebuild scope.

use crate::error::CoreResult;
use crate::layout::{NodeKind, StorageLayout};
use crate::metadata::{VersionDirectory, METADATA_FILE_NAME};
use crate::types::RepositoryKey;
use std::collections::BTreeMap;

const CHECKSUM_SUFFIXES: [&str; 4] = [".md5", ".sha1", ".sha256", ".sha512"];

/// Files of one artifact directory found by a walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ArtifactGroup {
    /// Artifact directory (`group segments/artifactId`), relative to the
    /// repository root.
    pub artifact_path: String,
    /// Relative paths of the artifact files found, sorted.
    pub files: Vec<String>,
}

/// Returns true if a file named `name` can be an artifact file.
///
/// Hidden files, checksums, repository metadata and our own metadata
/// documents are not artifacts.
#[must_use]
pub fn is_artifact_file(name: &str) -> bool {
    !name.starts_with('.')
        && !name.starts_with("maven-metadata")
        && name != METADATA_FILE_NAME
        && !CHECKSUM_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Normalizes a scope path: forward slashes, no leading or trailing slash.
pub(crate) fn normalize_scope(scope: Option<&str>) -> String {
    scope
        .unwrap_or("")
        .replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Artifact directory of the file at `relative_path`: the path without its
/// version directory and file name. `None` for files too shallow to belong
/// to an artifact.
pub(crate) fn artifact_path_of(relative_path: &str) -> Option<String> {
    let segments: Vec<&str> = relative_path.split('/').collect();
    (segments.len() >= 4).then(|| segments[..segments.len() - 2].join("/"))
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn register<'a>(
    groups: &'a mut BTreeMap<String, ArtifactGroup>,
    artifact_path: &str,
) -> &'a mut ArtifactGroup {
    groups
        .entry(artifact_path.to_string())
        .or_insert_with(|| ArtifactGroup {
            artifact_path: artifact_path.to_string(),
            files: Vec::new(),
        })
}

fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// Walks `scope` and groups the artifact files found by artifact directory.
///
/// Directories holding a metadata document are registered as groups even
/// without files, so that metadata of deleted artifacts is reconciled. The
/// scope and its ancestors are checked as well, which covers scopes naming a
/// deleted version directory or file.
pub(crate) fn discover(
    layout: &dyn StorageLayout,
    key: &RepositoryKey,
    scope: &str,
) -> CoreResult<BTreeMap<String, ArtifactGroup>> {
    let mut groups: BTreeMap<String, ArtifactGroup> = BTreeMap::new();

    let mut ancestor = Some(scope);
    while let Some(dir) = ancestor.filter(|d| !d.is_empty()) {
        // The scope itself may name a file.
        if layout.stat(key, dir)? == Some(NodeKind::Directory)
            && layout.stat(key, &join(dir, METADATA_FILE_NAME))? == Some(NodeKind::File)
        {
            register(&mut groups, dir);
        }
        ancestor = parent(dir);
    }

    let mut pending = Vec::new();
    match layout.stat(key, scope)? {
        Some(NodeKind::File) => {
            let name = scope.rsplit('/').next().unwrap_or(scope);
            if is_artifact_file(name) {
                if let Some(artifact_path) = artifact_path_of(scope) {
                    register(&mut groups, &artifact_path)
                        .files
                        .push(scope.to_string());
                }
            }
        }
        Some(NodeKind::Directory) => pending.push(scope.to_string()),
        None => {}
    }

    while let Some(dir) = pending.pop() {
        for node in layout.list(key, &dir)? {
            if node.name.starts_with('.') {
                continue;
            }
            let path = join(&dir, &node.name);
            match node.kind {
                NodeKind::Directory => pending.push(path),
                NodeKind::File if node.name == METADATA_FILE_NAME => {
                    register(&mut groups, &dir);
                }
                NodeKind::File if is_artifact_file(&node.name) => match artifact_path_of(&path) {
                    Some(artifact_path) => register(&mut groups, &artifact_path).files.push(path),
                    None => {
                        tracing::trace!(repository = %key, path = %path, "not inside an artifact directory");
                    }
                },
                NodeKind::File => {}
            }
        }
    }

    for group in groups.values_mut() {
        group.files.sort();
    }
    Ok(groups)
}

/// Lists the version directories of the artifact directory `artifact_path`
/// with their artifact files.
pub(crate) fn version_directories(
    layout: &dyn StorageLayout,
    key: &RepositoryKey,
    artifact_path: &str,
) -> CoreResult<Vec<VersionDirectory>> {
    let mut directories = Vec::new();
    for node in layout.list(key, artifact_path)? {
        if node.kind != NodeKind::Directory || node.name.starts_with('.') {
            continue;
        }
        let files = layout
            .list(key, &join(artifact_path, &node.name))?
            .into_iter()
            .filter(|n| n.kind == NodeKind::File && is_artifact_file(&n.name))
            .map(|n| n.name)
            .collect();
        directories.push(VersionDirectory::new(node.name, files));
    }
    Ok(directories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FsStorageLayout;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &std::path::Path, path: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, b"x").unwrap();
    }

    #[test]
    fn skip_rules() {
        assert!(is_artifact_file("lib-1.0.jar"));
        assert!(!is_artifact_file("lib-1.0.jar.sha1"));
        assert!(!is_artifact_file("lib-1.0.jar.md5"));
        assert!(!is_artifact_file("maven-metadata.xml"));
        assert!(!is_artifact_file(METADATA_FILE_NAME));
        assert!(!is_artifact_file(".hidden"));
    }

    #[test]
    fn scope_normalization() {
        assert_eq!(normalize_scope(None), "");
        assert_eq!(normalize_scope(Some("/org//example/")), "org/example");
        assert_eq!(normalize_scope(Some("org\\example")), "org/example");
    }

    #[test]
    fn groups_files_by_artifact_directory() {
        let temp = tempdir().unwrap();
        let layout = FsStorageLayout::new(temp.path());
        let key = RepositoryKey::new("storage0", "releases");
        let root = temp.path().join("storage0/releases");
        touch(&root, "org/example/lib/1.0/lib-1.0.jar");
        touch(&root, "org/example/lib/1.0/lib-1.0.jar.sha1");
        touch(&root, "org/example/lib/1.1/lib-1.1.jar");
        touch(&root, "org/example/tool/2.0/tool-2.0.pom");
        touch(&root, "org/example/gone/artifact-metadata.json");
        touch(&root, ".index/entries.journal");
        touch(&root, "README.txt");

        let groups = discover(&layout, &key, "").unwrap();
        let paths: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(
            paths,
            vec!["org/example/gone", "org/example/lib", "org/example/tool"]
        );
        assert_eq!(
            groups["org/example/lib"].files,
            vec![
                "org/example/lib/1.0/lib-1.0.jar",
                "org/example/lib/1.1/lib-1.1.jar"
            ]
        );
        assert!(groups["org/example/gone"].files.is_empty());
    }

    #[test]
    fn deleted_version_scope_registers_parent() {
        let temp = tempdir().unwrap();
        let layout = FsStorageLayout::new(temp.path());
        let key = RepositoryKey::new("storage0", "releases");
        let root = temp.path().join("storage0/releases");
        touch(&root, "org/example/lib/artifact-metadata.json");

        let groups = discover(&layout, &key, "org/example/lib/1.0").unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups.contains_key("org/example/lib"));
    }

    #[test]
    fn single_file_scope() {
        let temp = tempdir().unwrap();
        let layout = FsStorageLayout::new(temp.path());
        let key = RepositoryKey::new("storage0", "releases");
        let root = temp.path().join("storage0/releases");
        touch(&root, "org/example/lib/1.0/lib-1.0.jar");
        touch(&root, "org/example/lib/1.0/lib-1.0.pom");

        let groups = discover(&layout, &key, "org/example/lib/1.0/lib-1.0.jar").unwrap();
        assert_eq!(groups["org/example/lib"].files, vec!["org/example/lib/1.0/lib-1.0.jar"]);
    }

    #[test]
    fn unreadable_scope_fails_the_walk() {
        let temp = tempdir().unwrap();
        let layout = FsStorageLayout::new(temp.path());
        let key = RepositoryKey::new("storage0", "releases");
        let root = temp.path().join("storage0/releases");
        touch(&root, "org/example/lib/1.0/lib-1.0.jar");

        let scope = format!("org/{}", "x".repeat(300));
        assert!(discover(&layout, &key, &scope).is_err());
    }

    #[test]
    fn lists_version_directories() {
        let temp = tempdir().unwrap();
        let layout = FsStorageLayout::new(temp.path());
        let key = RepositoryKey::new("storage0", "releases");
        let root = temp.path().join("storage0/releases");
        touch(&root, "org/example/lib/1.0/lib-1.0.jar");
        touch(&root, "org/example/lib/1.0/lib-1.0.jar.md5");
        touch(&root, "org/example/lib/artifact-metadata.json");
        fs::create_dir_all(root.join("org/example/lib/2.0")).unwrap();

        let dirs = version_directories(&layout, &key, "org/example/lib").unwrap();
        assert_eq!(
            dirs,
            vec![
                VersionDirectory::new("1.0", vec!["lib-1.0.jar".to_string()]),
                VersionDirectory::new("2.0", vec![]),
            ]
        );
    }
}
