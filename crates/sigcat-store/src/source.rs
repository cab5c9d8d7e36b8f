//! Core trait and types for dataset access.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// What a listed path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Anything else (sockets, dangling links, ...).
    Other,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    /// Full path (`dir.join(name)`).
    pub path: PathBuf,
    /// Kind of node, following symlinks.
    pub kind: NodeKind,
}

/// Read-only access to a dataset tree.
///
/// Listing order is unspecified; callers impose their own ordering.
/// Implementations must be `Send + Sync` so checksum workers can share them.
pub trait DatasetSource: Send + Sync {
    /// List the direct children of `dir`.
    fn list_dir(&self, dir: &Path) -> Result<Vec<ListedEntry>, StoreError>;

    /// Whether `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Open a file for streaming reads.
    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>, StoreError>;
}
