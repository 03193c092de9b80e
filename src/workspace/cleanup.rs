//! Removal of end-of-turn marker tokens from rendered documents.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// What a cleanup pass touched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StripReport {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub markers_removed: usize,
}

/// Delete every occurrence of `marker` from files ending in `.{extension}`
/// under `root`. Files without the marker are not rewritten.
pub fn strip_markers(root: &Path, marker: &str, extension: &str) -> Result<StripReport> {
    if marker.is_empty() {
        anyhow::bail!("Marker to strip must not be empty");
    }

    let mut report = StripReport::default();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == extension)
            .unwrap_or(false);
        if !matches_ext {
            continue;
        }

        report.files_scanned += 1;
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let count = content.matches(marker).count();
        if count == 0 {
            continue;
        }

        fs::write(path, content.replace(marker, ""))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Removed {} marker(s) from {}", count, path.display());
        report.files_changed += 1;
        report.markers_removed += count;
    }

    Ok(report)
}
