//! CLI command implementations.

pub mod metadata;
pub mod rebuild;
pub mod search;
