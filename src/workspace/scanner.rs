//! Source file enumeration and loading.
//!
//! Walks a directory for files to analyze. By default every file is taken
//! (sorted by path); with `respect_ignore` the walk goes through
//! `ignore::WalkBuilder` and honours .gitignore files and hidden-file rules.
//! Structured documents from a previous run are never picked up again.

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extension of the per-file structured document.
pub const STRUCTURED_EXTENSION: &str = "json";

/// Extension of the per-file rendered document.
pub const RENDERED_EXTENSION: &str = "md";

/// What to walk and what to leave out.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub respect_ignore: bool,
    /// Directory subtree to skip (the output directory when it is nested).
    pub exclude: Option<PathBuf>,
}

/// A file ready for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the codebase root, with forward slashes.
    pub relative_path: String,
    pub content: String,
}

impl SourceFile {
    /// Read `path` for analysis.
    ///
    /// Returns `None`, with a warning, when the file is over `max_file_bytes`
    /// or is not valid UTF-8. Any other I/O failure is an error.
    pub fn load(
        path: &Path,
        relative_path: impl Into<String>,
        max_file_bytes: u64,
    ) -> Result<Option<Self>> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to get metadata for {}", path.display()))?;
        if metadata.len() > max_file_bytes {
            warn!(
                "Skipping large file ({} bytes): {}",
                metadata.len(),
                path.display()
            );
            return Ok(None);
        }

        let bytes =
            fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;
        let content = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(_) => {
                warn!("Skipping non-UTF-8 file: {}", path.display());
                return Ok(None);
            }
        };

        Ok(Some(Self {
            path: path.to_path_buf(),
            relative_path: relative_path.into(),
            content,
        }))
    }

    /// Content with the one-line path header the templates expect.
    pub fn subject(&self) -> String {
        format!("# python file {}\n\n{}", self.relative_path, self.content)
    }
}

fn is_structured_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == STRUCTURED_EXTENSION)
        .unwrap_or(false)
}

fn is_excluded(path: &Path, exclude: Option<&Path>) -> bool {
    exclude.map(|ex| path.starts_with(ex)).unwrap_or(false)
}

/// Relative path of `path` under `root`, with forward slashes.
pub fn relative_path(path: &Path, root: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).with_context(|| {
        format!(
            "{} is not inside {}",
            path.display(),
            root.display()
        )
    })?;
    Ok(rel.to_string_lossy().replace('\\', "/"))
}

/// Every eligible file under `directory`, sorted by path.
pub fn enumerate_files(directory: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>> {
    debug!("Scanning directory: {}", directory.display());
    let exclude = options.exclude.as_deref();

    let mut files = Vec::new();
    if options.respect_ignore {
        let mut builder = WalkBuilder::new(directory);
        builder.standard_filters(true);
        builder.require_git(false);
        builder.follow_links(false);
        builder.sort_by_file_path(|a, b| a.cmp(b));
        if let Some(ex) = exclude {
            let ex = ex.to_path_buf();
            builder.filter_entry(move |entry| !entry.path().starts_with(&ex));
        }

        for entry in builder.build() {
            let entry = entry
                .with_context(|| format!("Failed to walk directory {}", directory.display()))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                files.push(entry.into_path());
            }
        }
    } else {
        let walker = WalkDir::new(directory)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry.path(), exclude));

        for entry in walker {
            let entry = entry
                .with_context(|| format!("Failed to walk directory {}", directory.display()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }

    files.retain(|path| !is_structured_document(path));
    files.sort();

    debug!("Found {} files in {}", files.len(), directory.display());
    Ok(files)
}

/// Load `paths` as source files relative to `root`, dropping the ones
/// [`SourceFile::load`] skips.
pub fn load_sources(paths: &[PathBuf], root: &Path, max_file_bytes: u64) -> Result<Vec<SourceFile>> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        if let Some(source) = SourceFile::load(path, relative_path(path, root)?, max_file_bytes)? {
            sources.push(source);
        }
    }
    Ok(sources)
}
