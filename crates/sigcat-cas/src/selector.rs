//! Deterministic path selection: match, sort, cap.
//!
//! Listings come back in whatever order the source produces; everything
//! downstream depends on the order established here.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use sigcat_store::{DatasetSource, NodeKind};
use tracing::debug;

use crate::error::CasError;

/// How matched entries are ordered before the cap is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Byte-wise order of file names.
    Lexicographic,
    /// Integer after the last `_` in the file stem (`ch_10.mat` → 10).
    /// Ties fall back to file name order.
    IntegerSuffix,
}

/// Which kinds of entries a selection may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFilter {
    /// Files and directories alike.
    Any,
    /// Directories only.
    Dirs,
    /// Regular files only.
    Files,
}

impl EntryFilter {
    fn accepts(&self, kind: NodeKind) -> bool {
        match self {
            Self::Any => kind != NodeKind::Other,
            Self::Dirs => kind == NodeKind::Dir,
            Self::Files => kind == NodeKind::File,
        }
    }
}

/// Parameters for one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Glob matched against each entry's file name.
    pub pattern: String,
    /// Keep at most this many entries after sorting. `None` keeps all.
    pub cap: Option<usize>,
    /// Ordering applied before the cap.
    pub sort: SortKey,
    /// Entry kinds to consider.
    pub filter: EntryFilter,
}

impl SelectionPolicy {
    /// Policy matching `pattern`, lexicographic, uncapped, any kind.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            cap: None,
            sort: SortKey::Lexicographic,
            filter: EntryFilter::Any,
        }
    }

    /// Set the cap.
    pub fn cap(mut self, cap: Option<usize>) -> Self {
        self.cap = cap;
        self
    }

    /// Set the sort key.
    pub fn sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Set the entry filter.
    pub fn filter(mut self, filter: EntryFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// A selected path with its UTF-8 file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected {
    /// Full path.
    pub path: PathBuf,
    /// File name component.
    pub name: String,
}

/// Result of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Retained entries, in order.
    pub selected: Vec<Selected>,
    /// Number of matching entries before the cap was applied.
    pub matched: usize,
}

impl Selection {
    /// Retained paths, in order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.selected.iter().map(|s| s.path.as_path())
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Whether nothing was retained.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Extract the integer suffix of a file name as a canonical digit string.
///
/// The extension is dropped, the stem is split on `_`, and the last piece
/// must be all ASCII digits: `ch_12.mat` → `"12"`, `e_007.mat` → `"7"`,
/// `7.mat` → `"7"`. Leading zeros are stripped (`"0"` stays), so any length
/// of suffix is accepted. Returns `None` when the piece is not all digits.
pub fn extract_integer_suffix(name: &str) -> Option<&str> {
    let stem = Path::new(name).file_stem()?.to_str()?;
    let token = stem.rsplit('_').next()?;
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trimmed = token.trim_start_matches('0');
    Some(if trimmed.is_empty() { "0" } else { trimmed })
}

/// Numeric order of two canonical digit strings.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Selects ordered subsets of directory listings from a [`DatasetSource`].
pub struct PathSelector<'a> {
    source: &'a dyn DatasetSource,
}

impl<'a> PathSelector<'a> {
    /// Create a selector reading from `source`.
    pub fn new(source: &'a dyn DatasetSource) -> Self {
        Self { source }
    }

    /// List `root`, keep entries matching `policy`, sort, and cap.
    ///
    /// No matches is an empty selection, not an error. Hidden entries
    /// (leading `.`) only match patterns that themselves start with `.`.
    pub fn select(&self, root: &Path, policy: &SelectionPolicy) -> Result<Selection, CasError> {
        let matcher = compile(&policy.pattern)?;
        let include_hidden = policy.pattern.starts_with('.');

        let mut candidates = Vec::new();
        for entry in self.source.list_dir(root)? {
            if !policy.filter.accepts(entry.kind) {
                continue;
            }
            let Some(file_name) = entry.path.file_name() else {
                continue;
            };
            let Some(name) = file_name.to_str() else {
                return Err(CasError::Selection {
                    path: entry.path.clone(),
                    reason: "file name is not valid UTF-8".to_string(),
                });
            };
            if name.starts_with('.') && !include_hidden {
                continue;
            }
            if !matcher.is_match(name) {
                continue;
            }
            candidates.push(Selected {
                name: name.to_string(),
                path: entry.path,
            });
        }

        sort_selected(&mut candidates, policy.sort)?;

        let matched = candidates.len();
        if let Some(cap) = policy.cap {
            candidates.truncate(cap);
        }

        debug!(
            root = %root.display(),
            pattern = %policy.pattern,
            matched,
            retained = candidates.len(),
            "selected paths"
        );

        Ok(Selection {
            selected: candidates,
            matched,
        })
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher, CasError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| CasError::Configuration(format!("invalid glob {pattern:?}: {e}")))
}

fn sort_selected(items: &mut Vec<Selected>, sort: SortKey) -> Result<(), CasError> {
    match sort {
        SortKey::Lexicographic => {
            items.sort_by(|a, b| a.name.cmp(&b.name));
        }
        SortKey::IntegerSuffix => {
            if let Some(bad) = items
                .iter()
                .find(|item| extract_integer_suffix(&item.name).is_none())
            {
                return Err(CasError::Selection {
                    path: bad.path.clone(),
                    reason: "file name has no trailing _<digits> suffix".to_string(),
                });
            }
            items.sort_by(|a, b| {
                let (Some(sa), Some(sb)) = (
                    extract_integer_suffix(&a.name),
                    extract_integer_suffix(&b.name),
                ) else {
                    return a.name.cmp(&b.name);
                };
                cmp_digits(sa, sb).then_with(|| a.name.cmp(&b.name))
            });
        }
    }
    Ok(())
}
