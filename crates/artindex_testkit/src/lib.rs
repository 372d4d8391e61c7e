//! # artindex Testkit
//!
//! Test utilities for artindex.
//!
//! This crate provides:
//! - On-disk storage fixtures that generate repository layouts
//! - Property-based test generators using proptest
//! - A storage backend that simulates crashes and I/O failures
//!
//! ## Usage
//!
//! ```rust
//! use artindex_testkit::TestStorage;
//!
//! let storage = TestStorage::new();
//! let path = storage.generate_artifact("storage0", "releases", "org.example:lib:1.0");
//! assert_eq!(path, "org/example/lib/1.0/lib-1.0.jar");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
