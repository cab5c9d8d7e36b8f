//! Dataset access and manifest persistence.
//!
//! This crate defines the [`DatasetSource`] trait, the directory-lister
//! capability the manifest builder runs against, along with two backends:
//!
//! - [`LocalSource`]: the local filesystem.
//! - [`MemorySource`]: an in-memory tree, for tests and dry runs.
//!
//! It also provides [`write_atomic`] / [`read_all`] for persisting encoded
//! manifests without exposing half-written files.

mod error;
mod local_source;
mod memory_source;
mod persist;
mod source;

pub use error::StoreError;
pub use local_source::LocalSource;
pub use memory_source::MemorySource;
pub use persist::{read_all, write_atomic};
pub use source::{DatasetSource, ListedEntry, NodeKind};
