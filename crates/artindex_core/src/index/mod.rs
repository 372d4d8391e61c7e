//! Repository index storage.
//!
//! One [`IndexStore`] holds the entries of exactly one repository. The
//! [`JournaledIndexStore`] keeps entries in memory and persists every
//! mutation to an append-only journal through a
//! [`artindex_storage::StorageBackend`].
//!
//! # Invariants
//!
//! - At most one entry per relative path; re-adding a path replaces the entry
//! - A mutation whose journal write fails leaves the in-memory state untouched
//! - Query results are ordered by `(groupId, artifactId, version)`, ties in
//!   insertion order
//! - The index is derivable from the repository files; a lost journal is
//!   repaired by a rebuild

mod entry;
mod factory;
mod journal;
mod journaled;
mod predicate;
mod store;

pub use entry::IndexEntry;
pub use factory::{
    FileIndexStoreFactory, IndexStoreFactory, MemoryIndexStoreFactory, INDEX_DIR, JOURNAL_FILE,
    LOCK_FILE,
};
pub use journaled::{CompactionPolicy, JournaledIndexStore};
pub use predicate::{Clause, Field, Matcher, Occur, Predicate};
pub use store::{IndexStore, QueryIter, QueryResults};
