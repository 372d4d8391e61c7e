//! # artindex storage
//!
//! Byte-store backends for artindex.
//!
//! The repository index keeps its on-disk state as an append-only journal.
//! The journal is written through a [`StorageBackend`], which is an **opaque
//! byte store**: it knows nothing about index entries, journal framing or
//! CBOR. `artindex_core` owns every format decision.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - for tests and indexes that never touch disk
//! - [`FileBackend`] - for journals persisted under a repository's `.index/` directory
//!
//! ## Example
//!
//! ```rust
//! use artindex_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"journal record").unwrap();
//! assert_eq!(backend.read_at(offset, 7).unwrap(), b"journal");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
