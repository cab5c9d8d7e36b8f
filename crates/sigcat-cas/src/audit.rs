//! Manifest auditing: compare a stored manifest against a fresh build.

use std::collections::BTreeMap;
use std::fmt;

use sigcat_types::{Manifest, Record, Value};

/// How a path differs between the expected and actual manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscrepancyKind {
    /// Present in the expected manifest only.
    Missing,
    /// Present in the actual manifest only.
    Unexpected,
    /// Present in both with different values.
    Changed {
        /// Value in the expected manifest.
        expected: String,
        /// Value in the actual manifest.
        actual: String,
    },
}

/// One difference, addressed by a `/`-joined key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    /// `collection/outer[/middle]/inner`, or `@field` for header fields.
    pub path: String,
    /// What differs.
    pub kind: DiscrepancyKind,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiscrepancyKind::Missing => write!(f, "missing    {}", self.path),
            DiscrepancyKind::Unexpected => write!(f, "unexpected {}", self.path),
            DiscrepancyKind::Changed { expected, actual } => {
                write!(f, "changed    {}: {expected} -> {actual}", self.path)
            }
        }
    }
}

#[derive(PartialEq)]
enum Node<'a> {
    Branch,
    Leaf(&'a Value),
    Header(String),
}

impl Node<'_> {
    fn render(&self) -> String {
        match self {
            Node::Branch => "<mapping>".to_string(),
            Node::Leaf(value) => value.to_string(),
            Node::Header(s) => s.clone(),
        }
    }
}

fn cap(value: Option<u64>) -> String {
    value.map_or_else(|| "all".to_string(), |n| n.to_string())
}

fn flatten(manifest: &Manifest) -> BTreeMap<String, Node<'_>> {
    let mut out = BTreeMap::new();
    out.insert("@project".to_string(), Node::Header(manifest.project.clone()));
    out.insert("@subject".to_string(), Node::Header(manifest.subject.clone()));
    out.insert("@schema".to_string(), Node::Header(manifest.schema.to_string()));
    out.insert(
        "@algorithm".to_string(),
        Node::Header(manifest.algorithm.to_string()),
    );
    let selection = &manifest.selection;
    out.insert(
        "@key_scheme".to_string(),
        Node::Header(selection.key_scheme.to_string()),
    );
    out.insert("@max_sessions".to_string(), Node::Header(cap(selection.max_sessions)));
    out.insert("@max_channels".to_string(), Node::Header(cap(selection.max_channels)));

    for collection in &manifest.collections {
        out.insert(collection.name.clone(), Node::Branch);
        for outer in &collection.records {
            let outer_path = format!("{}/{}", collection.name, outer.key);
            match &outer.record {
                Record::Flat(entries) => {
                    for entry in entries {
                        out.insert(format!("{outer_path}/{}", entry.key), Node::Leaf(&entry.value));
                    }
                }
                Record::Nested(sections) => {
                    for section in sections {
                        let section_path = format!("{outer_path}/{}", section.key);
                        for entry in &section.entries {
                            out.insert(
                                format!("{section_path}/{}", entry.key),
                                Node::Leaf(&entry.value),
                            );
                        }
                        out.insert(section_path, Node::Branch);
                    }
                }
            }
            out.insert(outer_path, Node::Branch);
        }
    }
    out
}

/// List every difference between `expected` and `actual`, sorted by path.
///
/// Order of keys within a mapping is not compared; use `==` for a strict
/// structural comparison.
pub fn diff_manifests(expected: &Manifest, actual: &Manifest) -> Vec<Discrepancy> {
    let expected = flatten(expected);
    let mut actual = flatten(actual);
    let mut out = Vec::new();

    for (path, node) in expected {
        match actual.remove(&path) {
            None => out.push(Discrepancy {
                path,
                kind: DiscrepancyKind::Missing,
            }),
            Some(other) if other != node => out.push(Discrepancy {
                path,
                kind: DiscrepancyKind::Changed {
                    expected: node.render(),
                    actual: other.render(),
                },
            }),
            Some(_) => {}
        }
    }

    out.extend(actual.into_keys().map(|path| Discrepancy {
        path,
        kind: DiscrepancyKind::Unexpected,
    }));
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}
