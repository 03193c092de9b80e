//! Slot filling and batch dispatch.
//!
//! A rendered template is executed step by step: turns are appended to the
//! transcript, and each slot sends the transcript rendered so far to the
//! backend and appends whatever comes back. A batch runs one such pipeline
//! per subject with a bounded number in flight and returns the transcripts
//! in input order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use futures_util::stream::{self, StreamExt};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError, GenerateRequest, SamplingParams};
use crate::prompt::{
    extract, ChatTemplate, PromptScript, PromptTemplate, Role, SlotSpec, Step, Transcript, Turn,
};

/// Failure to fill one slot of a transcript.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("slot `{slot}`: {source}")]
    Backend {
        slot: String,
        #[source]
        source: BackendError,
    },

    #[error("slot `{slot}` produced {output:?}, which does not match `{pattern}`")]
    PatternMismatch {
        slot: String,
        pattern: String,
        output: String,
    },

    #[error("slot `{slot}` has an invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        slot: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Callback for reporting batch progress
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, done: usize, total: usize);
}

/// No-op progress callback
#[cfg(test)]
pub struct NoOpProgress;
#[cfg(test)]
impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _done: usize, _total: usize) {}
}

/// Logs progress roughly every tenth of the batch.
pub struct LogProgress {
    label: &'static str,
}

impl LogProgress {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl ProgressCallback for LogProgress {
    fn on_progress(&self, done: usize, total: usize) {
        let step = (total / 10).max(1);
        if done == total || done % step == 0 {
            info!("{}: {}/{} done", self.label, done, total);
        }
    }
}

/// An item that failed inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
}

/// Transcripts in input order. Failed items hold an empty transcript.
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub transcripts: Vec<Transcript>,
    pub failures: Vec<BatchFailure>,
}

/// Runs templates against one backend.
pub struct Dispatcher<B> {
    backend: B,
    chat: ChatTemplate,
    temperature: f32,
    /// Anchored surface patterns, compiled on first use.
    patterns: Mutex<HashMap<String, Regex>>,
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(backend: B, chat: ChatTemplate) -> Self {
        Self {
            backend,
            chat,
            temperature: 0.0,
            patterns: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn surface_pattern(&self, slot: &SlotSpec, pattern: &str) -> Result<Regex, GenerationError> {
        let mut patterns = self.patterns.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(re) = patterns.get(pattern) {
            return Ok(re.clone());
        }
        let re = compile_surface(slot, pattern)?;
        patterns.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    fn sampling_for(&self, slot: &SlotSpec) -> SamplingParams {
        SamplingParams {
            max_new_tokens: slot.max_tokens,
            temperature: self.temperature,
            stop: slot.stop.to_stop_list(),
            regex: slot.surface_regex.clone(),
        }
    }

    async fn fill_slot(
        &self,
        transcript: &Transcript,
        slot: &SlotSpec,
    ) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            text: transcript.render(&self.chat),
            sampling_params: self.sampling_for(slot),
        };

        let output = self
            .backend
            .generate(&request)
            .await
            .map_err(|source| GenerationError::Backend {
                slot: slot.name.clone(),
                source,
            })?;

        if let Some(pattern) = &slot.surface_regex {
            let re = self.surface_pattern(slot, pattern)?;
            check_surface(slot, pattern, &re, &output)?;
        }

        debug!("Filled slot {} ({} chars)", slot.name, output.len());
        Ok(output)
    }

    /// Execute a rendered script, filling every slot in order.
    pub async fn fill(&self, script: &PromptScript) -> Result<Transcript, GenerationError> {
        let mut transcript = Transcript::new();
        for step in script.steps() {
            match step {
                Step::Turn(turn) => transcript.push(turn.clone()),
                Step::Slot(slot) => {
                    let text = self.fill_slot(&transcript, slot).await?;
                    transcript.push(Turn::Generated {
                        slot: slot.name.clone(),
                        text,
                    });
                }
            }
        }

        let filled = transcript
            .turns()
            .iter()
            .filter(|turn| turn.role() == Some(Role::Generated))
            .count();
        debug!("Transcript complete: {} generated turns", filled);
        Ok(transcript)
    }

    /// Run `template` for one subject, inline.
    pub async fn run_single<T: PromptTemplate + ?Sized>(
        &self,
        template: &T,
        subject: &str,
    ) -> Result<Transcript, GenerationError> {
        let script = template.render(template.default_instructions(), subject);
        self.fill(&script).await
    }

    /// Run `template` once per subject with at most `concurrency_limit`
    /// pipelines in flight.
    ///
    /// `output.transcripts[i]` always belongs to `subjects[i]`. A failed item
    /// does not stop the others; it is recorded in `output.failures` and its
    /// slot holds an empty transcript.
    pub async fn dispatch<T: PromptTemplate + ?Sized>(
        &self,
        template: &T,
        subjects: &[String],
        concurrency_limit: usize,
        progress: &dyn ProgressCallback,
    ) -> BatchOutput {
        let total = subjects.len();
        let completed = AtomicUsize::new(0);
        let completed = &completed;

        debug!(
            "Dispatching {} {} prompts (concurrency {})",
            total,
            template.name(),
            concurrency_limit
        );

        let results: Vec<Result<Transcript, GenerationError>> = stream::iter(subjects)
            .map(move |subject| async move {
                let result = self.run_single(template, subject).await;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                progress.on_progress(done, total);
                result
            })
            .buffered(concurrency_limit.max(1))
            .collect()
            .await;

        let mut output = BatchOutput {
            transcripts: Vec::with_capacity(total),
            failures: Vec::new(),
        };
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(transcript) => output.transcripts.push(transcript),
                Err(e) => {
                    warn!("{} prompt #{} failed: {}", template.name(), index, e);
                    output.failures.push(BatchFailure {
                        index,
                        error: e.to_string(),
                    });
                    output.transcripts.push(Transcript::new());
                }
            }
        }
        output
    }

    /// The answer part of a finished transcript.
    pub fn answer<T: PromptTemplate + ?Sized>(&self, template: &T, transcript: &Transcript) -> String {
        extract(transcript, template.extraction_marker(), &self.chat)
    }
}

fn compile_surface(slot: &SlotSpec, pattern: &str) -> Result<Regex, GenerationError> {
    let anchored = format!("^(?:{})$", pattern);
    Regex::new(&anchored).map_err(|source| GenerationError::InvalidPattern {
        slot: slot.name.clone(),
        pattern: pattern.to_string(),
        source,
    })
}

fn check_surface(
    slot: &SlotSpec,
    pattern: &str,
    re: &Regex,
    output: &str,
) -> Result<(), GenerationError> {
    if re.is_match(output) {
        Ok(())
    } else {
        Err(GenerationError::PatternMismatch {
            slot: slot.name.clone(),
            pattern: pattern.to_string(),
            output: output.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::SYMBOL_PATTERN;

    #[test]
    fn test_check_surface_full_match() {
        let slot = SlotSpec::new("answer_0", 16).regex(SYMBOL_PATTERN);
        let re = compile_surface(&slot, SYMBOL_PATTERN).unwrap();
        assert!(check_surface(&slot, SYMBOL_PATTERN, &re, "* `main`:").is_ok());
        assert!(check_surface(&slot, SYMBOL_PATTERN, &re, "* `a b c`:").is_ok());

        for bad in ["* `main`", "`main`:", "* ``:", "* `main`: extra", "* `ma`in`:"] {
            let err = check_surface(&slot, SYMBOL_PATTERN, &re, bad).unwrap_err();
            assert!(matches!(err, GenerationError::PatternMismatch { .. }), "{bad}");
        }
    }

    #[test]
    fn test_compile_surface_invalid_pattern() {
        let slot = SlotSpec::new("broken", 4).regex("(");
        let err = compile_surface(&slot, "(").unwrap_err();
        assert!(matches!(err, GenerationError::InvalidPattern { .. }));
    }

    struct Unused;

    impl Backend for Unused {
        async fn generate(&self, _request: &GenerateRequest) -> Result<String, BackendError> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_surface_patterns_compiled_once() {
        let dispatcher = Dispatcher::new(Unused, ChatTemplate::chatml());
        let slot = SlotSpec::new("answer_0", 16).regex(SYMBOL_PATTERN);

        let first = dispatcher.surface_pattern(&slot, SYMBOL_PATTERN).unwrap();
        let second = dispatcher.surface_pattern(&slot, SYMBOL_PATTERN).unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert_eq!(dispatcher.patterns.lock().unwrap().len(), 1);

        let other = SlotSpec::new("digits", 4).regex(r"\d+");
        dispatcher.surface_pattern(&other, r"\d+").unwrap();
        assert_eq!(dispatcher.patterns.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_log_progress_does_not_panic_on_empty() {
        LogProgress::new("test").on_progress(0, 0);
        LogProgress::new("test").on_progress(3, 7);
    }
}
