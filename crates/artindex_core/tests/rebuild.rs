//! Integration tests for rebuilds, metadata reconciliation and search.

use artindex_core::index::{INDEX_DIR, JOURNAL_FILE};
use artindex_core::metadata::METADATA_FILE_NAME;
use artindex_core::{ArtifactSearch, Coordinate, CoreError, Predicate, RepositoryIndexManager};
use artindex_testkit::TestStorage;
use std::sync::Arc;

const STORAGE: &str = "storage0";
const RELEASES: &str = "releases";

fn manager(storage: &TestStorage) -> Arc<RepositoryIndexManager> {
    Arc::new(RepositoryIndexManager::open(storage.base()))
}

fn indexed_paths(manager: &RepositoryIndexManager, repository: &str) -> Vec<String> {
    let mut paths: Vec<String> = manager
        .query(STORAGE, repository, &Predicate::any())
        .unwrap()
        .into_iter()
        .map(|entry| entry.relative_path)
        .collect();
    paths.sort();
    paths
}

#[test]
fn rebuild_indexes_every_artifact_file() {
    let storage = TestStorage::new();
    let mut expected = vec![
        storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0"),
        storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0:pom"),
        storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0:jar:sources"),
        storage.generate_artifact(STORAGE, RELEASES, "org.example.tools:cli:2.1:tar.gz:bin"),
    ];
    expected.sort();
    storage.write_file(
        STORAGE,
        RELEASES,
        "org/example/lib/1.0/lib-1.0.jar.sha1",
        b"da39a3ee5e6b4b0d3255bfef95601890afd80709",
    );

    let manager = manager(&storage);
    let report = manager.rebuild(STORAGE, Some(RELEASES), None).unwrap();

    assert_eq!(report.repositories, 1);
    assert_eq!(report.groups_total, 2);
    assert_eq!(report.groups_completed, 2);
    assert_eq!(report.entries_indexed, 4);
    assert_eq!(indexed_paths(&manager, RELEASES), expected);
    assert!(storage.exists(STORAGE, RELEASES, &format!("org/example/lib/{METADATA_FILE_NAME}")));
}

#[test]
fn rebuild_is_idempotent() {
    let storage = TestStorage::new();
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0");
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.1");
    let manager = manager(&storage);

    manager.rebuild(STORAGE, Some(RELEASES), None).unwrap();
    let first_paths = indexed_paths(&manager, RELEASES);
    let first_metadata = manager.metadata(STORAGE, RELEASES, "org.example", "lib").unwrap();

    let report = manager.rebuild(STORAGE, Some(RELEASES), None).unwrap();
    assert_eq!(report.metadata_written, 0);
    assert_eq!(indexed_paths(&manager, RELEASES), first_paths);
    assert_eq!(
        manager.metadata(STORAGE, RELEASES, "org.example", "lib").unwrap(),
        first_metadata
    );
}

#[test]
fn rebuild_reconciles_deleted_versions() {
    let storage = TestStorage::new();
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0");
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.1");
    let manager = manager(&storage);
    manager.rebuild(STORAGE, Some(RELEASES), None).unwrap();

    storage.remove(STORAGE, RELEASES, "org/example/lib/1.1");
    manager.rebuild(STORAGE, Some(RELEASES), None).unwrap();

    assert_eq!(
        indexed_paths(&manager, RELEASES),
        vec!["org/example/lib/1.0/lib-1.0.jar".to_string()]
    );
    let metadata = manager
        .metadata(STORAGE, RELEASES, "org.example", "lib")
        .unwrap()
        .unwrap();
    assert_eq!(metadata.versions, vec!["1.0"]);
    assert_eq!(metadata.latest_version.as_deref(), Some("1.0"));

    storage.remove(STORAGE, RELEASES, "org/example/lib/1.0");
    manager.rebuild(STORAGE, Some(RELEASES), None).unwrap();
    assert!(indexed_paths(&manager, RELEASES).is_empty());
    assert!(manager
        .metadata(STORAGE, RELEASES, "org.example", "lib")
        .unwrap()
        .is_none());
}

#[test]
fn scope_naming_a_deleted_version_reconciles_it() {
    let storage = TestStorage::new();
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0");
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.1");
    let manager = manager(&storage);
    manager.rebuild(STORAGE, Some(RELEASES), None).unwrap();

    storage.remove(STORAGE, RELEASES, "org/example/lib/1.1");
    manager
        .rebuild(STORAGE, Some(RELEASES), Some("org/example/lib/1.1"))
        .unwrap();

    assert_eq!(indexed_paths(&manager, RELEASES).len(), 1);
    let metadata = manager
        .metadata(STORAGE, RELEASES, "org.example", "lib")
        .unwrap()
        .unwrap();
    assert_eq!(metadata.versions, vec!["1.0"]);
}

#[test]
fn versions_follow_numeric_ordering() {
    let storage = TestStorage::new();
    for version in ["1.10", "2.0-SNAPSHOT", "1.0", "1.2"] {
        storage.generate_artifact(STORAGE, RELEASES, &format!("org.example:lib:{version}"));
    }
    let manager = manager(&storage);
    manager.rebuild(STORAGE, Some(RELEASES), None).unwrap();

    let metadata = manager
        .metadata(STORAGE, RELEASES, "org.example", "lib")
        .unwrap()
        .unwrap();
    assert_eq!(metadata.versions, vec!["1.0", "1.2", "1.10", "2.0-SNAPSHOT"]);
    assert_eq!(metadata.latest_version.as_deref(), Some("2.0-SNAPSHOT"));
    assert_eq!(metadata.release_version.as_deref(), Some("1.10"));

    let search = ArtifactSearch::new(Arc::clone(&manager));
    let versions: Vec<String> = search
        .search_query(STORAGE, RELEASES, "+a:lib")
        .unwrap()
        .into_iter()
        .map(|c| c.version)
        .collect();
    assert_eq!(versions, vec!["1.0", "1.2", "1.10", "2.0-SNAPSHOT"]);
}

#[test]
fn snapshot_builds_yield_latest_descriptor() {
    let storage = TestStorage::new();
    let gav = "org.example:lib:1.1-SNAPSHOT";
    storage.generate_snapshot_build(STORAGE, "snapshots", gav, "20230101.120000", 1);
    storage.generate_snapshot_build(STORAGE, "snapshots", gav, "20230101.130000", 2);
    let manager = manager(&storage);
    manager.rebuild(STORAGE, Some("snapshots"), None).unwrap();

    let metadata = manager
        .metadata(STORAGE, "snapshots", "org.example", "lib")
        .unwrap()
        .unwrap();
    assert_eq!(metadata.versions, vec!["1.1-SNAPSHOT"]);
    assert_eq!(metadata.release_version, None);
    let descriptor = &metadata.snapshot_descriptors["1.1-SNAPSHOT"];
    assert_eq!(descriptor.build_number, 2);
    assert_eq!(descriptor.timestamp, "20230101.130000");

    let search = ArtifactSearch::new(Arc::clone(&manager));
    let builds = search
        .search_query(STORAGE, "snapshots", "+v:1.1-20230101*")
        .unwrap();
    assert_eq!(builds.len(), 2);
    assert_eq!(builds[1].version, "1.1-20230101.130000-2");
}

#[test]
fn failing_group_does_not_stop_the_rebuild() {
    let storage = TestStorage::new();
    storage.generate_artifact(STORAGE, RELEASES, "org.example:alpha:1.0");
    storage.write_file(STORAGE, RELEASES, "org/example/broken/1.0/unrelated-1.0.jar", b"?");
    storage.generate_artifact(STORAGE, RELEASES, "org.example:omega:1.0");
    let manager = manager(&storage);

    let err = manager.rebuild(STORAGE, Some(RELEASES), None).unwrap_err();
    let CoreError::Rebuild(rebuild) = err else {
        panic!("expected a rebuild error, got {err}");
    };
    assert_eq!(rebuild.failed_paths(), vec!["org/example/broken"]);
    assert_eq!(rebuild.report.groups_total, 3);
    assert_eq!(rebuild.report.groups_completed, 3);

    assert_eq!(
        indexed_paths(&manager, RELEASES),
        vec![
            "org/example/alpha/1.0/alpha-1.0.jar".to_string(),
            "org/example/omega/1.0/omega-1.0.jar".to_string(),
        ]
    );
    assert!(manager
        .metadata(STORAGE, RELEASES, "org.example", "omega")
        .unwrap()
        .is_some());
    assert!(manager
        .metadata(STORAGE, RELEASES, "org.example", "broken")
        .unwrap()
        .is_none());
}

#[test]
fn dotted_group_directories_are_rejected() {
    let storage = TestStorage::new();
    let canonical = storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0");
    storage.write_file(STORAGE, RELEASES, "org.example/lib/1.0/lib-1.0.jar", b"jar");
    let manager = manager(&storage);

    let err = manager.rebuild(STORAGE, Some(RELEASES), None).unwrap_err();
    let CoreError::Rebuild(rebuild) = err else {
        panic!("expected a rebuild error, got {err}");
    };
    assert_eq!(rebuild.failed_paths(), vec!["org.example/lib"]);

    let exact = Predicate::for_coordinate(&Coordinate::new("org.example", "lib", "1.0", "jar"));
    let hits: Vec<String> = manager
        .query(STORAGE, RELEASES, &exact)
        .unwrap()
        .into_iter()
        .map(|entry| entry.relative_path)
        .collect();
    assert_eq!(hits, vec![canonical]);
    assert!(!storage.exists(STORAGE, RELEASES, &format!("org.example/lib/{METADATA_FILE_NAME}")));
}

#[test]
fn deploy_into_dotted_group_directory_fails() {
    let storage = TestStorage::new();
    let path = "org.example/lib/1.0/lib-1.0.jar";
    storage.write_file(STORAGE, RELEASES, path, b"jar");
    let manager = manager(&storage);

    assert!(matches!(
        manager.record_deploy(STORAGE, RELEASES, path),
        Err(CoreError::MalformedPath { .. })
    ));
    assert!(manager
        .metadata(STORAGE, RELEASES, "org.example", "lib")
        .unwrap()
        .is_none());
}

#[test]
fn storage_wide_rebuild_visits_every_repository() {
    let storage = TestStorage::new();
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0");
    storage.generate_artifact(STORAGE, "snapshots", "org.example:lib:1.1-SNAPSHOT");
    storage.generate_artifact("storage1", RELEASES, "org.other:lib:1.0");
    let manager = manager(&storage);

    let report = manager.rebuild(STORAGE, None, None).unwrap();
    assert_eq!(report.repositories, 2);
    assert_eq!(report.entries_indexed, 2);
    assert_eq!(indexed_paths(&manager, "snapshots").len(), 1);
    assert!(!storage
        .repository_root("storage1", RELEASES)
        .join(INDEX_DIR)
        .exists());
}

#[test]
fn scoped_rebuild_leaves_other_artifacts_alone() {
    let storage = TestStorage::new();
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0");
    let manager = manager(&storage);
    manager.rebuild(STORAGE, Some(RELEASES), None).unwrap();

    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.1");
    storage.generate_artifact(STORAGE, RELEASES, "org.example:other:1.0");
    let report = manager
        .rebuild(STORAGE, Some(RELEASES), Some("org/example/lib"))
        .unwrap();
    assert_eq!(report.groups_total, 1);

    let search = ArtifactSearch::new(Arc::clone(&manager));
    let lib_11 = Coordinate::new("org.example", "lib", "1.1", "jar");
    let other = Coordinate::new("org.example", "other", "1.0", "jar");
    assert!(search.contains(STORAGE, RELEASES, &lib_11).unwrap());
    assert!(!search.contains(STORAGE, RELEASES, &other).unwrap());
    assert_eq!(indexed_paths(&manager, RELEASES).len(), 2);
}

#[test]
fn metadata_rebuild_leaves_the_index_alone() {
    let storage = TestStorage::new();
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0");
    let manager = manager(&storage);

    let report = manager.rebuild_metadata(STORAGE, Some(RELEASES), None).unwrap();
    assert_eq!(report.entries_indexed, 0);
    assert_eq!(report.metadata_written, 1);
    assert!(manager
        .metadata(STORAGE, RELEASES, "org.example", "lib")
        .unwrap()
        .is_some());
    assert!(indexed_paths(&manager, RELEASES).is_empty());
}

#[test]
fn index_survives_reopen() {
    let storage = TestStorage::new();
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0");
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.1");

    {
        let manager = manager(&storage);
        manager.rebuild(STORAGE, Some(RELEASES), None).unwrap();
    }

    let manager = manager(&storage);
    assert_eq!(indexed_paths(&manager, RELEASES).len(), 2);
}

#[test]
fn corrupted_journal_fails_search() {
    let storage = TestStorage::new();
    storage.generate_artifact(STORAGE, RELEASES, "org.example:lib:1.0");
    {
        let manager = manager(&storage);
        manager.rebuild(STORAGE, Some(RELEASES), None).unwrap();
    }

    storage.write_file(
        STORAGE,
        RELEASES,
        &format!("{INDEX_DIR}/{JOURNAL_FILE}"),
        b"garbage bytes",
    );

    let manager = manager(&storage);
    let search = ArtifactSearch::new(Arc::clone(&manager));
    assert!(matches!(
        search.search(STORAGE, RELEASES, &Predicate::any()),
        Err(CoreError::IndexPersistence { .. })
    ));
}
