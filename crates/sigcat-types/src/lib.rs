//! Shared types for sigcat.
//!
//! This crate defines the manifest data model used across the workspace:
//! the nested keyed structure ([`Manifest`] → [`NamedCollection`] →
//! [`Record`] → [`Entry`]), schema selectors ([`SchemaKind`], [`KeyScheme`],
//! [`CollectionName`], [`HashAlgorithm`]) and the build configuration record
//! ([`DatasetConfig`], [`SubjectConventions`], [`BuildPolicy`]).
//!
//! Every mapping level is an ordered `Vec`: insertion order reflects directory
//! enumeration order and is part of the manifest's identity.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Current manifest format version.
pub const MANIFEST_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while populating or validating the manifest model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A key was inserted twice into the same mapping level.
    #[error("duplicate {level} key {key:?}")]
    DuplicateKey {
        /// Which level of the manifest the key belongs to.
        level: KeyLevel,
        /// The offending key.
        key: String,
    },

    /// A record has the wrong shape: a flat entry inserted into a nested
    /// record (or vice versa), or a record that disagrees with the
    /// manifest's schema.
    #[error("record shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Shape required by the record or manifest.
        expected: SchemaKind,
        /// Shape actually found or implied by the insert.
        actual: SchemaKind,
    },

    /// A schema/key-scheme/algorithm name could not be parsed.
    #[error("unknown {kind} {value:?}")]
    UnknownName {
        /// What was being parsed.
        kind: &'static str,
        /// The unrecognized input.
        value: String,
    },
}

/// Level of the manifest a key lives at, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLevel {
    /// Collection name within the manifest.
    Collection,
    /// Outer key within a collection.
    Outer,
    /// Middle key within a nested record.
    Middle,
    /// Inner key within a flat mapping.
    Inner,
}

impl fmt::Display for KeyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Collection => "collection",
            Self::Outer => "outer",
            Self::Middle => "middle",
            Self::Inner => "inner",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Keyed helpers
// ---------------------------------------------------------------------------

/// Anything stored in an ordered, uniquely-keyed list.
trait Keyed {
    fn key(&self) -> &str;
}

macro_rules! impl_keyed {
    ($($name:ident),* $(,)?) => {
        $(
            impl Keyed for $name {
                fn key(&self) -> &str {
                    &self.key
                }
            }
        )*
    };
}

fn find<'a, T: Keyed>(items: &'a [T], key: &str) -> Option<&'a T> {
    items.iter().find(|item| item.key() == key)
}

fn push_unique<T: Keyed>(items: &mut Vec<T>, item: T, level: KeyLevel) -> Result<(), ModelError> {
    if find(items, item.key()).is_some() {
        return Err(ModelError::DuplicateKey {
            level,
            key: item.key().to_string(),
        });
    }
    items.push(item);
    Ok(())
}

fn check_unique<T: Keyed>(items: &[T], level: KeyLevel) -> Result<(), ModelError> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.key()) {
            return Err(ModelError::DuplicateKey {
                level,
                key: item.key().to_string(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// A tagged scalar value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// UTF-8 string (checksums, names).
    Str(String),
    /// Signed 64-bit integer (counts).
    Int(i64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

/// The atomic `(key, value)` pair inside a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Inner key (e.g. a channel file name).
    pub key: String,
    /// Scalar value.
    pub value: Value,
}

/// A middle-level mapping inside a nested record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Middle key (e.g. `"electrodes"`).
    pub key: String,
    /// Inner entries in insertion order.
    pub entries: Vec<Entry>,
}

impl Section {
    /// Create an empty section.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entries: Vec::new(),
        }
    }

    /// Append an entry, rejecting duplicate inner keys.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), ModelError> {
        push_unique(
            &mut self.entries,
            Entry {
                key: key.into(),
                value: value.into(),
            },
            KeyLevel::Inner,
        )
    }

    /// Look up an inner value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        find(&self.entries, key).map(|e| &e.value)
    }
}

/// Per-outer-key value structure. Its shape never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    /// Inner key → value.
    Flat(Vec<Entry>),
    /// Middle key → (inner key → value).
    Nested(Vec<Section>),
}

impl Record {
    /// Empty flat record.
    pub fn flat() -> Self {
        Self::Flat(Vec::new())
    }

    /// Empty nested record.
    pub fn nested() -> Self {
        Self::Nested(Vec::new())
    }

    /// The record's shape.
    pub fn kind(&self) -> SchemaKind {
        match self {
            Self::Flat(_) => SchemaKind::Flat,
            Self::Nested(_) => SchemaKind::Nested,
        }
    }

    /// Append an entry to a flat record.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), ModelError> {
        match self {
            Self::Flat(entries) => push_unique(
                entries,
                Entry {
                    key: key.into(),
                    value: value.into(),
                },
                KeyLevel::Inner,
            ),
            Self::Nested(_) => Err(ModelError::ShapeMismatch {
                expected: SchemaKind::Nested,
                actual: SchemaKind::Flat,
            }),
        }
    }

    /// Append a section to a nested record.
    pub fn insert_section(&mut self, section: Section) -> Result<(), ModelError> {
        match self {
            Self::Nested(sections) => push_unique(sections, section, KeyLevel::Middle),
            Self::Flat(_) => Err(ModelError::ShapeMismatch {
                expected: SchemaKind::Flat,
                actual: SchemaKind::Nested,
            }),
        }
    }

    /// Look up an inner value in a flat record.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Flat(entries) => find(entries, key).map(|e| &e.value),
            Self::Nested(_) => None,
        }
    }

    /// Look up a section in a nested record.
    pub fn section(&self, key: &str) -> Option<&Section> {
        match self {
            Self::Nested(sections) => find(sections, key),
            Self::Flat(_) => None,
        }
    }

    /// Number of entries (flat) or sections (nested).
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(entries) => entries.len(),
            Self::Nested(sections) => sections.len(),
        }
    }

    /// Whether the record holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(&self) -> Result<(), ModelError> {
        match self {
            Self::Flat(entries) => check_unique(entries, KeyLevel::Inner),
            Self::Nested(sections) => {
                check_unique(sections, KeyLevel::Middle)?;
                sections
                    .iter()
                    .try_for_each(|s| check_unique(&s.entries, KeyLevel::Inner))
            }
        }
    }
}

/// An outer key and its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OuterEntry {
    /// Outer key (zero-padded index or session basename).
    pub key: String,
    /// The record stored under this key.
    pub record: Record,
}

impl_keyed!(Entry, Section, OuterEntry);

/// A uniquely-named ordered mapping from outer key to [`Record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCollection {
    /// Collection name, unique within the manifest.
    pub name: String,
    /// Records in insertion order.
    pub records: Vec<OuterEntry>,
}

impl Keyed for NamedCollection {
    fn key(&self) -> &str {
        &self.name
    }
}

impl NamedCollection {
    /// Create an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
        }
    }

    /// Append a record, rejecting duplicate outer keys.
    pub fn insert(&mut self, key: impl Into<String>, record: Record) -> Result<(), ModelError> {
        push_unique(
            &mut self.records,
            OuterEntry {
                key: key.into(),
                record,
            },
            KeyLevel::Outer,
        )
    }

    /// Look up the record stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Record> {
        find(&self.records, key).map(|e| &e.record)
    }

    /// Outer keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|e| e.key.as_str())
    }

    /// Number of outer keys.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Root of the catalog: everything known about one subject's dataset.
///
/// Built once by the manifest builder, serialized once, then only read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version; must equal [`MANIFEST_VERSION`] to be decoded.
    pub version: u8,
    /// Project identifier (e.g. `"tfs"`).
    pub project: String,
    /// Subject identifier (e.g. `"625"`).
    pub subject: String,
    /// Shape of the records in this manifest.
    pub schema: SchemaKind,
    /// Digest algorithm used for every checksum value.
    pub algorithm: HashAlgorithm,
    /// Key scheme and caps the manifest was built with.
    pub selection: SelectionRecord,
    /// Named collections in insertion order.
    pub collections: Vec<NamedCollection>,
}

impl Manifest {
    /// Create an empty manifest.
    pub fn new(
        project: impl Into<String>,
        subject: impl Into<String>,
        schema: SchemaKind,
        algorithm: HashAlgorithm,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION,
            project: project.into(),
            subject: subject.into(),
            schema,
            algorithm,
            selection: SelectionRecord::default(),
            collections: Vec::new(),
        }
    }

    /// Append a collection, rejecting duplicate names.
    pub fn push_collection(&mut self, collection: NamedCollection) -> Result<(), ModelError> {
        push_unique(&mut self.collections, collection, KeyLevel::Collection)
    }

    /// Look up a collection by name.
    pub fn collection(&self, name: &str) -> Option<&NamedCollection> {
        find(&self.collections, name)
    }

    /// Re-check key uniqueness at every level and that every record has
    /// the shape `schema` calls for.
    ///
    /// Inserts already enforce uniqueness; decoded manifests must be checked
    /// explicitly because the wire format can express duplicates and
    /// mixed shapes.
    pub fn validate(&self) -> Result<(), ModelError> {
        check_unique(&self.collections, KeyLevel::Collection)?;
        for collection in &self.collections {
            check_unique(&collection.records, KeyLevel::Outer)?;
            for outer in &collection.records {
                let actual = outer.record.kind();
                if actual != self.schema {
                    return Err(ModelError::ShapeMismatch {
                        expected: self.schema,
                        actual,
                    });
                }
                outer.record.validate()?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Schema selectors
// ---------------------------------------------------------------------------

macro_rules! define_name_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant),*
        }

        impl $name {
            /// Canonical lowercase name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)*
                    other => Err(ModelError::UnknownName {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

define_name_enum!(
    /// Record shape used throughout a manifest.
    SchemaKind, "schema" {
        /// Four parallel collections with flat records.
        Flat => "flat",
        /// One `sessions` collection with nested records.
        Nested => "nested",
    }
);

define_name_enum!(
    /// How outer keys are derived from a session.
    KeyScheme, "key scheme" {
        /// Zero-padded positional index: `"000"`, `"001"`, ...
        Index => "index",
        /// The session directory's basename.
        Basename => "basename",
    }
);

define_name_enum!(
    /// Digest algorithm for file checksums.
    HashAlgorithm, "hash algorithm" {
        /// SHA-256 (default).
        Sha256 => "sha256",
        /// SHA-512.
        Sha512 => "sha512",
        /// BLAKE3.
        Blake3 => "blake3",
    }
);

define_name_enum!(
    /// Names of the collections the builder populates.
    CollectionName, "collection" {
        /// Flat: outer key → session name.
        Conversations => "conversations",
        /// Flat: outer key → datum file checksum.
        DatumChecksums => "datum_checksums",
        /// Flat: outer key → channel file count.
        ElectrodeCounts => "electrode_counts",
        /// Flat: outer key → per-channel checksums.
        ElectrodeChecksums => "electrode_checksums",
        /// Nested: outer key → datum / electrodes / counts sections.
        Sessions => "sessions",
    }
);

impl CollectionName {
    /// Collections produced for a schema, in manifest order.
    pub fn for_schema(schema: SchemaKind) -> &'static [CollectionName] {
        match schema {
            SchemaKind::Flat => &[
                Self::Conversations,
                Self::DatumChecksums,
                Self::ElectrodeCounts,
                Self::ElectrodeChecksums,
            ],
            SchemaKind::Nested => &[Self::Sessions],
        }
    }
}

impl KeyScheme {
    /// Outer key for the session at position `index` named `basename`.
    pub fn outer_key(&self, index: usize, basename: &str) -> String {
        match self {
            Self::Index => format!("{index:03}"),
            Self::Basename => basename.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Build configuration
// ---------------------------------------------------------------------------

/// Per-subject folder-naming conventions, resolved by the configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectConventions {
    /// Name of the per-session folder holding channel files.
    pub electrode_folder: String,
    /// Glob matched against file names inside the datum folder.
    pub datum_pattern: String,
}

/// Selection caps, key scheme and checksum parameters for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPolicy {
    /// Record shape to produce.
    pub schema: SchemaKind,
    /// How outer keys are derived.
    pub key_scheme: KeyScheme,
    /// Maximum number of sessions (first N in name order). `None` = all.
    pub max_sessions: Option<usize>,
    /// Maximum channel files per session (first N by suffix). `None` = all.
    pub max_channels: Option<usize>,
    /// Glob for channel files inside the electrode folder.
    pub channel_pattern: String,
    /// Per-session folder holding the datum file.
    pub datum_folder: String,
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Read size used while streaming files through the digest.
    pub chunk_size: usize,
    /// Number of files checksummed concurrently.
    pub workers: usize,
}

impl Default for BuildPolicy {
    fn default() -> Self {
        Self {
            schema: SchemaKind::Flat,
            key_scheme: KeyScheme::Index,
            max_sessions: Some(3),
            max_channels: Some(4),
            channel_pattern: "*.mat".to_string(),
            datum_folder: "misc".to_string(),
            algorithm: HashAlgorithm::Sha256,
            chunk_size: 65_536,
            workers: 4,
        }
    }
}

/// The selection half of a [`BuildPolicy`], stored in the manifest header
/// so a later rebuild can select exactly the same files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRecord {
    /// How outer keys were derived.
    pub key_scheme: KeyScheme,
    /// Session cap; `None` = all.
    pub max_sessions: Option<u64>,
    /// Channel cap per session; `None` = all.
    pub max_channels: Option<u64>,
}

impl Default for SelectionRecord {
    fn default() -> Self {
        Self {
            key_scheme: KeyScheme::Index,
            max_sessions: None,
            max_channels: None,
        }
    }
}

impl SelectionRecord {
    /// Capture the selection parameters of `policy`.
    pub fn from_policy(policy: &BuildPolicy) -> Self {
        Self {
            key_scheme: policy.key_scheme,
            max_sessions: policy.max_sessions.map(|n| n as u64),
            max_channels: policy.max_channels.map(|n| n as u64),
        }
    }

    /// Overwrite the selection parameters of `policy` with these.
    pub fn apply(&self, policy: &mut BuildPolicy) {
        let cap = |n: u64| usize::try_from(n).unwrap_or(usize::MAX);
        policy.key_scheme = self.key_scheme;
        policy.max_sessions = self.max_sessions.map(cap);
        policy.max_channels = self.max_channels.map(cap);
    }
}

/// Everything the manifest builder needs for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    /// Project identifier.
    pub project: String,
    /// Subject identifier; also the subject's folder name under `data_dir`.
    pub subject: String,
    /// Dataset root containing one folder per subject.
    pub data_dir: PathBuf,
    /// Folder conventions for this subject.
    pub conventions: SubjectConventions,
    /// Caps, schema and checksum parameters.
    pub policy: BuildPolicy,
}

impl DatasetConfig {
    /// The subject's own data root: `data_dir/<subject>`.
    pub fn subject_root(&self) -> PathBuf {
        self.data_dir.join(&self.subject)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
