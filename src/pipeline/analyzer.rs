//! Per-file analysis: three backend-driven templates plus the local import
//! scan, assembled into an [`AnalysisRecord`].

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use super::dispatch::{BatchOutput, Dispatcher, LogProgress};
use crate::backend::Backend;
use crate::config::AnalysisOptions;
use crate::domain::AnalysisRecord;
use crate::prompt::{
    scan_imports, HighlightTemplate, OverallSummaryTemplate, PromptTemplate, PseudocodeTemplate,
};
use crate::workspace::SourceFile;

/// One analysis of one file that failed inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisFailure {
    pub relative_path: String,
    pub analysis: &'static str,
    pub error: String,
}

/// Records in input order, plus the analyses that fell back to empty text.
#[derive(Debug, Default)]
pub struct BatchAnalysis {
    pub records: Vec<AnalysisRecord>,
    pub failures: Vec<AnalysisFailure>,
}

pub struct FileAnalyzer<'a, B> {
    dispatcher: &'a Dispatcher<B>,
    concurrency: usize,
    max_file_bytes: u64,
}

impl<'a, B: Backend> FileAnalyzer<'a, B> {
    pub fn new(dispatcher: &'a Dispatcher<B>, options: &AnalysisOptions) -> Self {
        Self {
            dispatcher,
            concurrency: options.concurrency.max(1),
            max_file_bytes: options.max_file_bytes,
        }
    }

    /// Read one file and run the four analyses on it, one after another.
    ///
    /// `None` means the file was skipped (too large or not UTF-8).
    pub async fn analyze(
        &self,
        file_path: &Path,
        relative_path: &str,
    ) -> Result<Option<AnalysisRecord>> {
        match SourceFile::load(file_path, relative_path, self.max_file_bytes)? {
            Some(source) => Ok(Some(self.analyze_source(&source).await?)),
            None => Ok(None),
        }
    }

    async fn analyze_source(&self, source: &SourceFile) -> Result<AnalysisRecord> {
        let subject = source.subject();
        debug!("Analyzing {}", source.relative_path);

        let highlights = self.run_one(&HighlightTemplate, &subject, source).await?;
        let overall_summary = self.run_one(&OverallSummaryTemplate, &subject, source).await?;
        let pseudocode = self.run_one(&PseudocodeTemplate, &subject, source).await?;

        Ok(AnalysisRecord {
            highlights,
            overall_summary,
            pseudocode,
            import_relationships: scan_imports(&subject),
        })
    }

    async fn run_one<T: PromptTemplate>(
        &self,
        template: &T,
        subject: &str,
        source: &SourceFile,
    ) -> Result<String> {
        let transcript = self
            .dispatcher
            .run_single(template, subject)
            .await
            .with_context(|| {
                format!("{} analysis failed for {}", template.name(), source.relative_path)
            })?;
        Ok(self.dispatcher.answer(template, &transcript))
    }

    /// Run each analysis as one batch across all `sources`.
    pub async fn analyze_batch(&self, sources: &[SourceFile]) -> BatchAnalysis {
        let subjects: Vec<String> = sources.iter().map(SourceFile::subject).collect();
        let mut failures = Vec::new();

        let highlights = self
            .run_batch(&HighlightTemplate, &subjects, sources, &mut failures)
            .await;
        let summaries = self
            .run_batch(&OverallSummaryTemplate, &subjects, sources, &mut failures)
            .await;
        let pseudocode = self
            .run_batch(&PseudocodeTemplate, &subjects, sources, &mut failures)
            .await;

        let records = highlights
            .into_iter()
            .zip(summaries)
            .zip(pseudocode)
            .zip(subjects.iter())
            .map(|(((highlights, overall_summary), pseudocode), subject)| AnalysisRecord {
                highlights,
                overall_summary,
                pseudocode,
                import_relationships: scan_imports(subject),
            })
            .collect();

        BatchAnalysis { records, failures }
    }

    async fn run_batch<T: PromptTemplate>(
        &self,
        template: &T,
        subjects: &[String],
        sources: &[SourceFile],
        failures: &mut Vec<AnalysisFailure>,
    ) -> Vec<String> {
        let progress = LogProgress::new(template.name());
        let BatchOutput {
            transcripts,
            failures: batch_failures,
        } = self
            .dispatcher
            .dispatch(template, subjects, self.concurrency, &progress)
            .await;

        failures.extend(batch_failures.into_iter().map(|f| AnalysisFailure {
            relative_path: sources[f.index].relative_path.clone(),
            analysis: template.name(),
            error: f.error,
        }));

        transcripts
            .iter()
            .map(|t| {
                if t.is_empty() {
                    String::new()
                } else {
                    self.dispatcher.answer(template, t)
                }
            })
            .collect()
    }
}
