//! Local filesystem dataset source.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::source::{DatasetSource, ListedEntry, NodeKind};

/// Dataset source backed by the local filesystem.
///
/// Paths handed to it are used as-is; there is no root confinement.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSource;

impl LocalSource {
    /// Create a new local source.
    pub fn new() -> Self {
        Self
    }
}

fn classify(path: &Path) -> NodeKind {
    // Follow symlinks so linked session folders behave like real ones.
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => NodeKind::Dir,
        Ok(meta) if meta.is_file() => NodeKind::File,
        Ok(_) => NodeKind::Other,
        // Listed but not stat-able (e.g. a dangling symlink). Reported as a
        // file so that opening it fails instead of it silently vanishing.
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot stat listed entry");
            NodeKind::File
        }
    }
}

impl DatasetSource for LocalSource {
    fn list_dir(&self, dir: &Path) -> Result<Vec<ListedEntry>, StoreError> {
        let reader = std::fs::read_dir(dir).map_err(|e| StoreError::from_io(dir, e))?;

        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry.map_err(|e| StoreError::from_io(dir, e))?;
            let path: PathBuf = entry.path();
            let kind = classify(&path);
            entries.push(ListedEntry { path, kind });
        }

        debug!(dir = %dir.display(), count = entries.len(), "listed directory");
        Ok(entries)
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>, StoreError> {
        let file = File::open(path).map_err(|e| StoreError::from_io(path, e))?;
        Ok(Box::new(file))
    }
}
