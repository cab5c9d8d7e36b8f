//! Streaming file checksums.

use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::Digest;
use sigcat_store::{DatasetSource, StoreError};
use sigcat_types::HashAlgorithm;

use crate::error::CasError;

/// Default read size while streaming a file through the digest.
pub const DEFAULT_CHUNK_SIZE: usize = 65_536;

enum Hasher {
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Sha512 => Self::Sha512(sha2::Sha512::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Computes lowercase hex digests of file contents.
///
/// Files are read in fixed-size chunks, so memory use does not depend on
/// file size. Holds no state between calls.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumEngine {
    algorithm: HashAlgorithm,
    chunk_size: usize,
}

impl Default for ChecksumEngine {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChecksumEngine {
    /// Create an engine for the given algorithm and read size in bytes.
    pub fn new(algorithm: HashAlgorithm, chunk_size: usize) -> Result<Self, CasError> {
        if chunk_size == 0 {
            return Err(CasError::Configuration(
                "checksum chunk size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            algorithm,
            chunk_size,
        })
    }

    /// The digest algorithm in use.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Digest everything `reader` yields.
    pub fn checksum_reader(&self, mut reader: impl Read) -> std::io::Result<String> {
        let mut hasher = Hasher::new(self.algorithm);
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }

        Ok(hasher.finalize_hex())
    }

    /// Digest the file at `path` as seen through `source`.
    pub fn checksum(&self, source: &dyn DatasetSource, path: &Path) -> Result<String, CasError> {
        let reader = source.open(path)?;
        self.checksum_reader(reader)
            .map_err(|e| CasError::Io(StoreError::from_io(path, e)))
    }

    /// Digest a file on the local filesystem.
    pub fn checksum_file(&self, path: &Path) -> Result<String, CasError> {
        self.checksum(&sigcat_store::LocalSource, path)
    }
}
