//! Directory-level orchestration: analyze every file under a directory,
//! persist the per-file documents, then summarize the summaries.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::analyzer::{AnalysisFailure, FileAnalyzer};
use super::dispatch::Dispatcher;
use super::output::{read_record, write_digest, write_record, WrittenPaths};
use crate::backend::Backend;
use crate::config::{AnalysisMode, AnalysisOptions};
use crate::domain::{AnalysisRecord, DirectoryDigest};
use crate::prompt::{OverallSummaryTemplate, PromptTemplate};
use crate::workspace::{enumerate_files, load_sources, relative_path, ScanOptions, SourceFile};

/// Outcome of one aggregation run.
#[derive(Debug, Default)]
pub struct AggregateReport {
    pub files_analyzed: usize,
    pub failures: Vec<AnalysisFailure>,
    /// None when the directory held no eligible files.
    pub digest_path: Option<PathBuf>,
    /// Documents written more than once because sources mapped onto them.
    pub overwritten: usize,
}

/// Concatenate per-file summaries under path headers, in the given order.
pub fn concatenate_summaries<'s>(entries: impl IntoIterator<Item = (&'s str, &'s str)>) -> String {
    let mut out = String::new();
    for (path, summary) in entries {
        out.push_str(&format!("# {}\n\n{}\n\n", path, summary.trim()));
    }
    out
}

/// Canonical directory, codebase root and output root, plus the output
/// subtree to skip when it sits inside the directory being walked.
struct Roots {
    directory: PathBuf,
    codebase_root: PathBuf,
    exclude: Option<PathBuf>,
}

fn resolve_roots(directory: &Path, output_root: &Path, codebase_root: &Path) -> Result<Roots> {
    let codebase_root = codebase_root
        .canonicalize()
        .with_context(|| format!("Failed to resolve codebase root {}", codebase_root.display()))?;
    let directory = directory
        .canonicalize()
        .with_context(|| format!("Failed to resolve directory {}", directory.display()))?;
    if !directory.starts_with(&codebase_root) {
        anyhow::bail!(
            "{} is not inside the codebase root {}",
            directory.display(),
            codebase_root.display()
        );
    }

    let output = output_root
        .canonicalize()
        .with_context(|| format!("Failed to resolve output directory {}", output_root.display()))?;
    // The output directory is skipped only when strictly nested; writing
    // next to the sources still analyzes them.
    let exclude = (output != directory && output.starts_with(&directory)).then_some(output);

    Ok(Roots {
        directory,
        codebase_root,
        exclude,
    })
}

pub struct Aggregator<'a, B> {
    dispatcher: &'a Dispatcher<B>,
    options: &'a AnalysisOptions,
}

impl<'a, B: Backend> Aggregator<'a, B> {
    pub fn new(dispatcher: &'a Dispatcher<B>, options: &'a AnalysisOptions) -> Self {
        Self {
            dispatcher,
            options,
        }
    }

    fn scan_options(&self, roots: &Roots) -> ScanOptions {
        ScanOptions {
            respect_ignore: self.options.respect_ignore,
            exclude: roots.exclude.clone(),
        }
    }

    fn collect_sources(&self, roots: &Roots) -> Result<Vec<SourceFile>> {
        let paths = enumerate_files(&roots.directory, &self.scan_options(roots))?;
        load_sources(&paths, &roots.codebase_root, self.options.max_file_bytes)
    }

    /// Analyze every file under `directory` and write its documents under
    /// `output_root`, mirroring the layout below `codebase_root`. Then
    /// write the directory digest.
    pub async fn aggregate(
        &self,
        directory: &Path,
        output_root: &Path,
        codebase_root: &Path,
    ) -> Result<AggregateReport> {
        fs::create_dir_all(output_root).with_context(|| {
            format!("Failed to create output directory {}", output_root.display())
        })?;
        let roots = resolve_roots(directory, output_root, codebase_root)?;

        let analyzer = FileAnalyzer::new(self.dispatcher, self.options);
        let mut written = WrittenPaths::default();
        // (relative path, record) in enumeration order
        let mut analyzed: Vec<(String, AnalysisRecord)> = Vec::new();
        let mut failures: Vec<AnalysisFailure> = Vec::new();

        match self.options.mode {
            AnalysisMode::Single => {
                let paths = enumerate_files(&roots.directory, &self.scan_options(&roots))?;
                info!("Analyzing {} files (single mode)", paths.len());
                for (i, path) in paths.iter().enumerate() {
                    let rel = relative_path(path, &roots.codebase_root)?;
                    let Some(record) = analyzer.analyze(path, &rel).await? else {
                        continue;
                    };
                    write_record(output_root, &rel, &record, &mut written)?;
                    info!("[{}/{}] {}", i + 1, paths.len(), rel);
                    analyzed.push((rel, record));
                }
            }
            AnalysisMode::Batch => {
                let sources = self.collect_sources(&roots)?;
                if !sources.is_empty() {
                    info!("Analyzing {} files (batch mode)", sources.len());
                    let batch = analyzer.analyze_batch(&sources).await;
                    for (source, record) in sources.iter().zip(&batch.records) {
                        write_record(output_root, &source.relative_path, record, &mut written)?;
                    }
                    analyzed = sources
                        .into_iter()
                        .map(|s| s.relative_path)
                        .zip(batch.records)
                        .collect();
                    failures = batch.failures;
                }
            }
        }

        if analyzed.is_empty() {
            info!("No files to analyze under {}", roots.directory.display());
            return Ok(AggregateReport::default());
        }

        // Summaries that fell back to empty text carry nothing to digest.
        let summary_name = OverallSummaryTemplate.name();
        let failed: HashSet<&str> = failures
            .iter()
            .filter(|f| f.analysis == summary_name)
            .map(|f| f.relative_path.as_str())
            .collect();
        let summaries: Vec<(&str, &str)> = analyzed
            .iter()
            .filter(|(rel, _)| !failed.contains(rel.as_str()))
            .map(|(rel, record)| (rel.as_str(), record.overall_summary.as_str()))
            .collect();

        if summaries.is_empty() {
            anyhow::bail!(
                "No file summaries to digest under {}: all {} overall summaries failed",
                roots.directory.display(),
                analyzed.len()
            );
        }

        let relative_dir = relative_path(&roots.directory, &roots.codebase_root)?;
        let digest = self.digest(&relative_dir, summaries).await?;
        let digest_path = write_digest(output_root, &digest, &mut written)?;
        info!("Wrote directory digest {}", digest_path.display());

        Ok(AggregateReport {
            files_analyzed: analyzed.len(),
            failures,
            digest_path: Some(digest_path),
            overwritten: written.collisions(),
        })
    }

    /// Feed the concatenated per-file summaries through the summary template.
    pub async fn digest<'s>(
        &self,
        relative_dir: &str,
        summaries: impl IntoIterator<Item = (&'s str, &'s str)>,
    ) -> Result<DirectoryDigest> {
        let subject = concatenate_summaries(summaries);
        let template = OverallSummaryTemplate;
        let transcript = self
            .dispatcher
            .run_single(&template, &subject)
            .await
            .with_context(|| {
                format!(
                    "Directory digest failed for {}",
                    if relative_dir.is_empty() { "." } else { relative_dir }
                )
            })?;

        Ok(DirectoryDigest {
            directory: relative_dir.to_string(),
            overall_summary: self.dispatcher.answer(&template, &transcript),
        })
    }

    /// Rebuild only the digest, from structured documents already on disk.
    ///
    /// Every eligible file under `directory` must have a complete structured
    /// document under `output_root`.
    pub async fn rebuild_digest(
        &self,
        directory: &Path,
        output_root: &Path,
        codebase_root: &Path,
    ) -> Result<Option<PathBuf>> {
        let roots = resolve_roots(directory, output_root, codebase_root)?;
        let sources = self.collect_sources(&roots)?;
        if sources.is_empty() {
            warn!("No files under {}; nothing to digest", roots.directory.display());
            return Ok(None);
        }

        let records = sources
            .iter()
            .map(|s| read_record(output_root, &s.relative_path))
            .collect::<Result<Vec<_>>>()?;

        let relative_dir = relative_path(&roots.directory, &roots.codebase_root)?;
        let digest = self
            .digest(
                &relative_dir,
                sources
                    .iter()
                    .zip(&records)
                    .map(|(s, r)| (s.relative_path.as_str(), r.overall_summary.as_str())),
            )
            .await?;
        Ok(Some(write_digest(output_root, &digest, &mut WrittenPaths::default())?))
    }
}
