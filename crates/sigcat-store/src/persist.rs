//! Whole-file persistence for encoded manifests.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::StoreError;

/// Write `data` to `path` atomically.
///
/// The bytes go to a temporary file in the same directory, are flushed to
/// disk, and the file is then renamed into place. Readers never observe a
/// partially written manifest.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::from_io(parent, e))?;
    }

    let tmp_path = path.with_extension("tmp");
    let result = (|| -> Result<(), StoreError> {
        let mut file =
            std::fs::File::create(&tmp_path).map_err(|e| StoreError::from_io(&tmp_path, e))?;
        file.write_all(data)
            .map_err(|e| StoreError::from_io(&tmp_path, e))?;
        file.sync_all()
            .map_err(|e| StoreError::from_io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, path).map_err(|e| StoreError::from_io(path, e))
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result?;

    debug!(path = %path.display(), size = data.len(), "wrote manifest file");
    Ok(())
}

/// Read the full contents of `path`.
pub fn read_all(path: &Path) -> Result<Vec<u8>, StoreError> {
    std::fs::read(path).map_err(|e| StoreError::from_io(path, e))
}
