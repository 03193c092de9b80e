//! Structured and rendered documents on disk.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::domain::{AnalysisRecord, DirectoryDigest};
use crate::workspace::{RENDERED_EXTENSION, STRUCTURED_EXTENSION};

/// File name of the directory digest document.
pub const DIGEST_FILE_NAME: &str = "_overall.md";

/// Output paths for the source file at `relative_path`.
pub fn record_paths(output_dir: &Path, relative_path: &str) -> (PathBuf, PathBuf) {
    let base = output_dir.join(relative_path);
    (
        base.with_extension(STRUCTURED_EXTENSION),
        base.with_extension(RENDERED_EXTENSION),
    )
}

/// Where the digest of `relative_dir` goes.
pub fn digest_path(output_dir: &Path, relative_dir: &str) -> PathBuf {
    if relative_dir.is_empty() {
        output_dir.join(DIGEST_FILE_NAME)
    } else {
        output_dir.join(relative_dir).join(DIGEST_FILE_NAME)
    }
}

/// JSON with four-space indentation.
fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .context("Failed to serialize analysis record")?;
    String::from_utf8(buf).context("Serialized JSON is not UTF-8")
}

pub fn render_record(record: &AnalysisRecord) -> String {
    let mut out = String::new();
    out.push_str("\n\n### Summary\n\n");
    out.push_str(record.overall_summary.trim());
    out.push_str("\n\n### Highlights\n\n");
    out.push_str(record.highlights.trim());
    out.push_str(&format!(
        "\n\n### Pythonic Pseudocode\n\n```python\n{}\n```",
        record.pseudocode.trim()
    ));
    out.push_str("\n\n\n### import Relationships\n\n");
    out.push_str(record.import_relationships.trim());
    out
}

pub fn render_digest(digest: &DirectoryDigest) -> String {
    format!("\n\n### Summary\n\n{}", digest.overall_summary.trim())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Documents written during one run.
///
/// Distinct sources can map onto the same document (`a.py` and `a.md`, or a
/// root file named `_overall.*`); the later write wins and is flagged.
#[derive(Debug, Default)]
pub struct WrittenPaths {
    paths: HashSet<PathBuf>,
    collisions: usize,
}

impl WrittenPaths {
    fn note(&mut self, path: &Path, source: &str) {
        if !self.paths.insert(path.to_path_buf()) {
            self.collisions += 1;
            warn!(
                "{} overwrites {}, already written in this run",
                source,
                path.display()
            );
        }
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

/// Write the structured and rendered documents for one file.
pub fn write_record(
    output_dir: &Path,
    relative_path: &str,
    record: &AnalysisRecord,
    written: &mut WrittenPaths,
) -> Result<()> {
    let (json_path, md_path) = record_paths(output_dir, relative_path);
    written.note(&json_path, relative_path);
    written.note(&md_path, relative_path);
    write_file(&json_path, &to_json_pretty(record)?)?;
    write_file(&md_path, &render_record(record))
}

/// Read back a structured document. Missing fields are an error.
pub fn read_record(output_dir: &Path, relative_path: &str) -> Result<AnalysisRecord> {
    let (json_path, _) = record_paths(output_dir, relative_path);
    let content = fs::read_to_string(&json_path).with_context(|| {
        format!(
            "Missing structured document for {}: {}",
            relative_path,
            json_path.display()
        )
    })?;
    serde_json::from_str(&content)
        .with_context(|| format!("Malformed structured document {}", json_path.display()))
}

pub fn write_digest(
    output_dir: &Path,
    digest: &DirectoryDigest,
    written: &mut WrittenPaths,
) -> Result<PathBuf> {
    let path = digest_path(output_dir, &digest.directory);
    written.note(&path, "directory digest");
    write_file(&path, &render_digest(digest))?;
    Ok(path)
}
