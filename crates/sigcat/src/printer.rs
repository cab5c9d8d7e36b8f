//! Human-readable manifest rendering.

use std::fmt::Write;

use sigcat_types::{Entry, Manifest, Record};

/// Render `manifest` as indented text, preserving key order.
pub fn render(manifest: &Manifest) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_manifest(&mut out, manifest);
    out
}

fn write_manifest(out: &mut String, manifest: &Manifest) -> std::fmt::Result {
    writeln!(out, "project: {}", manifest.project)?;
    writeln!(out, "subject: {}", manifest.subject)?;
    writeln!(out, "schema: {}", manifest.schema)?;
    writeln!(out, "algorithm: {}", manifest.algorithm)?;
    let selection = &manifest.selection;
    writeln!(
        out,
        "selection: key_scheme={} max_sessions={} max_channels={}",
        selection.key_scheme,
        cap(selection.max_sessions),
        cap(selection.max_channels)
    )?;

    for collection in &manifest.collections {
        writeln!(out, "[{}]", collection.name)?;
        for outer in &collection.records {
            writeln!(out, "  {}", outer.key)?;
            match &outer.record {
                Record::Flat(entries) => write_entries(out, entries, 4)?,
                Record::Nested(sections) => {
                    for section in sections {
                        writeln!(out, "    {}", section.key)?;
                        write_entries(out, &section.entries, 6)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn cap(value: Option<u64>) -> String {
    value.map_or_else(|| "all".to_string(), |n| n.to_string())
}

fn write_entries(out: &mut String, entries: &[Entry], indent: usize) -> std::fmt::Result {
    for entry in entries {
        writeln!(out, "{:indent$}{}: {}", "", entry.key, entry.value)?;
    }
    Ok(())
}
