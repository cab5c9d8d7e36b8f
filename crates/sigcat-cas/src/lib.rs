//! Dataset cataloguing: checksums, path selection, and manifest building.
//!
//! This crate provides:
//! - [`ChecksumEngine`]: streaming hex digests of file contents.
//! - [`PathSelector`]: glob matching with deterministic ordering and caps.
//! - [`ManifestBuilder`]: walks a subject's sessions into a [`Manifest`].
//! - [`encode_manifest`] / [`decode_manifest`]: the on-disk manifest encoding.
//! - [`diff_manifests`]: compares a stored manifest against a fresh build.
//!
//! [`Manifest`]: sigcat_types::Manifest

mod audit;
mod builder;
mod checksum;
mod codec;
mod error;
mod selector;

pub use audit::{Discrepancy, DiscrepancyKind, diff_manifests};
pub use builder::{
    COUNT_KEY, COUNTS_SECTION, DATUM_SECTION, ELECTRODES_SECTION, ManifestBuilder, NAME_KEY,
    checksum_all,
};
pub use checksum::{ChecksumEngine, DEFAULT_CHUNK_SIZE};
pub use codec::{
    MAGIC, MANIFEST_EXTENSION, decode_manifest, encode_manifest, manifest_digest,
    manifest_file_name, read_manifest_file, write_manifest_file,
};
pub use error::CasError;
pub use selector::{
    EntryFilter, PathSelector, Selected, Selection, SelectionPolicy, SortKey,
    extract_integer_suffix,
};
