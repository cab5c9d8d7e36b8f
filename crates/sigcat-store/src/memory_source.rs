//! In-memory dataset source.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::error::StoreError;
use crate::source::{DatasetSource, ListedEntry, NodeKind};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
    /// A file that lists fine but fails on open.
    Unreadable,
}

/// In-memory dataset tree backed by a `RwLock<HashMap>`.
///
/// Parent directories are created implicitly when files are added.
/// Listing order follows the hash map and is unordered.
#[derive(Debug, Default)]
pub struct MemorySource {
    nodes: RwLock<HashMap<PathBuf, Node>>,
}

impl MemorySource {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory (and its ancestors).
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut nodes = self.nodes.write().expect("lock poisoned");
        Self::insert_ancestors(&mut nodes, path.as_ref());
        nodes.insert(path.as_ref().to_path_buf(), Node::Dir);
    }

    /// Add a file with the given contents (and its ancestors).
    pub fn add_file(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) {
        self.insert_leaf(path.as_ref(), Node::File(data.into()));
    }

    /// Add a file that appears in listings but cannot be opened.
    pub fn add_unreadable(&self, path: impl AsRef<Path>) {
        self.insert_leaf(path.as_ref(), Node::Unreadable);
    }

    fn insert_leaf(&self, path: &Path, node: Node) {
        let mut nodes = self.nodes.write().expect("lock poisoned");
        Self::insert_ancestors(&mut nodes, path);
        debug!(path = %path.display(), "adding in-memory file");
        nodes.insert(path.to_path_buf(), node);
    }

    fn insert_ancestors(nodes: &mut HashMap<PathBuf, Node>, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
        }
    }
}

impl DatasetSource for MemorySource {
    fn list_dir(&self, dir: &Path) -> Result<Vec<ListedEntry>, StoreError> {
        let nodes = self.nodes.read().expect("lock poisoned");
        match nodes.get(dir) {
            Some(Node::Dir) => {}
            Some(_) => {
                return Err(StoreError::Io {
                    path: dir.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotADirectory,
                        "not a directory",
                    ),
                });
            }
            None => return Err(StoreError::NotFound(dir.to_path_buf())),
        }

        Ok(nodes
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .map(|(path, node)| ListedEntry {
                path: path.clone(),
                kind: match node {
                    Node::Dir => NodeKind::Dir,
                    Node::File(_) | Node::Unreadable => NodeKind::File,
                },
            })
            .collect())
    }

    fn is_dir(&self, path: &Path) -> bool {
        let nodes = self.nodes.read().expect("lock poisoned");
        matches!(nodes.get(path), Some(Node::Dir))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>, StoreError> {
        let nodes = self.nodes.read().expect("lock poisoned");
        match nodes.get(path) {
            Some(Node::File(data)) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(Node::Unreadable) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "permission denied",
                ),
            }),
            Some(Node::Dir) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::IsADirectory, "is a directory"),
            }),
            None => Err(StoreError::NotFound(path.to_path_buf())),
        }
    }
}
