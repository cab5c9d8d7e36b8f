//! Error types for cataloging operations.

use std::path::PathBuf;

use sigcat_store::StoreError;
use sigcat_types::ModelError;

/// Errors that can occur while building, encoding, or decoding a manifest.
#[derive(Debug, thiserror::Error)]
pub enum CasError {
    /// Unknown project/subject, missing data root, or an invalid policy value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A file name violates the expected layout convention.
    #[error("selection error at {}: {reason}", path.display())]
    Selection {
        /// Offending path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A file or directory could not be read.
    #[error("io error: {0}")]
    Io(#[from] StoreError),

    /// Encoded manifest bytes do not match the expected framing.
    #[error("corrupt manifest data: {0}")]
    CorruptData(String),

    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Manifest has an unsupported version.
    #[error("unsupported manifest version {found}, this build supports version {supported}")]
    UnsupportedVersion {
        /// Version found in the manifest.
        found: u8,
        /// Version this build supports.
        supported: u8,
    },

    /// The manifest model rejected an insert.
    #[error("manifest model error: {0}")]
    Model(#[from] ModelError),

    /// A checksum worker task panicked or was cancelled.
    #[error("checksum worker failed: {0}")]
    Worker(String),
}
