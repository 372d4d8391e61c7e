//! # artindex Core
//!
//! Repository index manager for artifact repositories.
//!
//! This crate provides:
//! - Coordinate extraction from repository paths
//! - Numeric-aware and lexicographic version ordering
//! - Per-artifact metadata generation (versions, latest/release, snapshot builds)
//! - Journaled per-repository index stores with coordinate predicates
//! - The [`RepositoryIndexManager`]: handle lifecycle, deploys and rebuilds
//! - The [`ArtifactSearch`] query façade
//!
//! # Example
//!
//! ```rust,no_run
//! use artindex_core::{ArtifactSearch, RepositoryIndexManager};
//! use std::sync::Arc;
//!
//! let manager = Arc::new(RepositoryIndexManager::open("/srv/storages"));
//! manager.rebuild("storage0", Some("releases"), None)?;
//!
//! let search = ArtifactSearch::new(Arc::clone(&manager));
//! for coordinate in search.search_query("storage0", "releases", "+g:org.example +a:lib")? {
//!     println!("{coordinate}");
//! }
//! # Ok::<(), artindex_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod config;
pub mod coordinate;
mod error;
pub mod index;
mod layout;
mod manager;
pub mod metadata;
mod search;
mod types;
pub mod version;
mod walk;

pub use cancel::CancellationToken;
pub use config::{ConfigurationProvider, ManagerConfig, RepositoryConfig, StaticConfiguration};
pub use coordinate::{extract, Coordinate, SnapshotBuild};
pub use error::{CoreError, CoreResult, GroupFailure, RebuildError, RebuildReport};
pub use index::{
    FileIndexStoreFactory, IndexEntry, IndexStore, IndexStoreFactory, MemoryIndexStoreFactory,
    Predicate, QueryResults,
};
pub use layout::{FsStorageLayout, Node, NodeKind, StorageLayout};
pub use manager::{RepositoryIndexHandle, RepositoryIndexManager};
pub use metadata::{ArtifactMetadata, MetadataGenerator, SnapshotDescriptor, VersionDirectory};
pub use search::ArtifactSearch;
pub use types::{IndexState, RepositoryKey};
pub use version::{VersionOrdering, VersionOrderingKind};
pub use walk::is_artifact_file;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
