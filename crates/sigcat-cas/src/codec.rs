//! Manifest serialization.
//!
//! An encoded manifest is the 4-byte magic `SGCM` followed by the postcard
//! encoding of the [`Manifest`]. Postcard is deterministic for the model's
//! types (ordered `Vec`s, no hash maps), so encoding the same manifest twice
//! yields identical bytes, and the blake3 of those bytes
//! ([`manifest_digest`]) identifies the manifest's content.

use std::path::{Path, PathBuf};

use sigcat_types::{MANIFEST_VERSION, Manifest};
use tracing::{debug, info};

use crate::error::CasError;

/// Leading bytes of every encoded manifest.
pub const MAGIC: [u8; 4] = *b"SGCM";

/// File extension for persisted manifests.
pub const MANIFEST_EXTENSION: &str = "sgcm";

/// Serialize a manifest to bytes.
pub fn encode_manifest(manifest: &Manifest) -> Result<Vec<u8>, CasError> {
    let body =
        postcard::to_allocvec(manifest).map_err(|e| CasError::Serialization(e.to_string()))?;
    let mut out = Vec::with_capacity(MAGIC.len() + body.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a manifest from bytes.
///
/// Fails with [`CasError::CorruptData`] on a bad magic, truncated or malformed
/// postcard data, trailing bytes, duplicate keys, or records whose shape
/// disagrees with the schema. Never returns a partial manifest. A version
/// byte other than [`MANIFEST_VERSION`] is [`CasError::UnsupportedVersion`],
/// whether it was written by another release or corrupted.
pub fn decode_manifest(bytes: &[u8]) -> Result<Manifest, CasError> {
    let body = bytes
        .strip_prefix(&MAGIC[..])
        .ok_or_else(|| CasError::CorruptData("missing manifest magic".to_string()))?;

    // `version` is the first field and a u8 encodes as one raw byte, so it
    // can be checked before the rest of the layout is trusted.
    if let Some(&found) = body.first()
        && found != MANIFEST_VERSION
    {
        return Err(CasError::UnsupportedVersion {
            found,
            supported: MANIFEST_VERSION,
        });
    }

    let (manifest, rest): (Manifest, &[u8]) =
        postcard::take_from_bytes(body).map_err(|e| CasError::CorruptData(e.to_string()))?;

    if !rest.is_empty() {
        return Err(CasError::CorruptData(format!(
            "{} trailing bytes after manifest",
            rest.len()
        )));
    }

    manifest
        .validate()
        .map_err(|e| CasError::CorruptData(e.to_string()))?;

    Ok(manifest)
}

/// blake3 hex digest of encoded manifest bytes.
pub fn manifest_digest(encoded: &[u8]) -> String {
    blake3::hash(encoded).to_hex().to_string()
}

/// Conventional file name: `<project>_<subject>.sgcm`.
pub fn manifest_file_name(project: &str, subject: &str) -> PathBuf {
    PathBuf::from(format!("{project}_{subject}.{MANIFEST_EXTENSION}"))
}

/// Encode `manifest` and write it atomically to `path`.
///
/// Returns the manifest digest.
pub fn write_manifest_file(path: &Path, manifest: &Manifest) -> Result<String, CasError> {
    let bytes = encode_manifest(manifest)?;
    sigcat_store::write_atomic(path, &bytes)?;
    let digest = manifest_digest(&bytes);
    info!(path = %path.display(), size = bytes.len(), %digest, "manifest written");
    Ok(digest)
}

/// Read and decode the manifest at `path`.
pub fn read_manifest_file(path: &Path) -> Result<Manifest, CasError> {
    let bytes = sigcat_store::read_all(path)?;
    debug!(path = %path.display(), size = bytes.len(), "decoding manifest file");
    decode_manifest(&bytes)
}
