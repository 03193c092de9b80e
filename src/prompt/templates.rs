//! The fixed prompt templates used to analyze a source file.
//!
//! Each template seeds the assistant turn with a lead-in sentence (its
//! anchor). The anchor carries no meaning for the model; it exists so the
//! extractor has an unambiguous split point in the finished transcript.

use super::slot::{SlotSpec, StopCondition};
use super::transcript::{PromptScript, CHATML_END_OF_TURN};

/// A multi-turn prompt with generation slots.
pub trait PromptTemplate: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Lead-in sentence seeded into the assistant turn.
    fn anchor(&self) -> &'static str;

    /// Marker the answer is split at. Defaults to the anchor.
    fn extraction_marker(&self) -> &'static str {
        self.anchor()
    }

    /// Task text placed in front of the subject in the user turn.
    fn default_instructions(&self) -> &'static str;

    /// Token budget for slots that do not set their own.
    fn max_new_tokens(&self) -> u32;

    fn render(&self, task_instructions: &str, subject: &str) -> PromptScript;
}

pub const HIGHLIGHT_ANCHOR: &str = "There are 5 key features I can highlight.";
pub const SUMMARY_ANCHOR: &str = "Sure. There are multiple methods and classes.";
pub const PSEUDOCODE_ANCHOR: &str =
    "Sure. Here is the pythonic pseudocode that overviews the file you described.";

/// Opening fence the pseudocode slot continues from.
pub const PSEUDOCODE_FENCE: &str = "```python";

/// Symbol slot grammar: a bullet, then a backtick-quoted name and a colon.
pub const SYMBOL_PATTERN: &str = r"\* `([^`]+)`:";

const HIGHLIGHT_COUNT: usize = 5;
const SUMMARY_SYMBOL_COUNT: usize = 5;

const SUMMARY_RATING_INSTRUCTIONS: &str = "1. List all the major, important methods and functions, and rate their importance. it has to be in form of \n* `function_or_class_or_class_method`: EXPLANATION. Importance : **[IMPORTANCE]**\nFor example,\n* `default_inference_config`: Provides a default configuration for DeepSpeed inference. Importance : **[High]**\n\n* `_LRScheduler` `DeepSpeedOptimizerCallable`, `DeepSpeedSchedulerCallable`: Class and function types for handling optimizers and learning rate schedulers with DeepSpeed. Importance : **[Medium]**\n\n* `cli_main`: Wraps `main` for a command-line interface. Importance : **[Low]**\n\n";

/// Five single-line highlights, numbered 1 to 5.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighlightTemplate;

impl PromptTemplate for HighlightTemplate {
    fn name(&self) -> &'static str {
        "highlight"
    }

    fn anchor(&self) -> &'static str {
        HIGHLIGHT_ANCHOR
    }

    fn default_instructions(&self) -> &'static str {
        "Highlight the key features of this code:"
    }

    fn max_new_tokens(&self) -> u32 {
        1024
    }

    fn render(&self, task_instructions: &str, subject: &str) -> PromptScript {
        let mut script = PromptScript::new()
            .system("You are a helpful assistant specialized in highlighting key features of code.")
            .user(format!(
                "{}\n\n{}. What would you say is the key thing to look for for this code?",
                task_instructions, subject
            ))
            .assistant(format!("{}\n", HIGHLIGHT_ANCHOR));

        for i in 0..HIGHLIGHT_COUNT {
            script = script.text(format!("\n{}.", i + 1)).gen(
                SlotSpec::new(format!("gen_{}", i), 512).stop(StopCondition::newline()),
            );
        }
        script
    }
}

/// Rated symbol list followed by a free-form description of the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverallSummaryTemplate;

impl PromptTemplate for OverallSummaryTemplate {
    fn name(&self) -> &'static str {
        "overall_summary"
    }

    fn anchor(&self) -> &'static str {
        SUMMARY_ANCHOR
    }

    fn default_instructions(&self) -> &'static str {
        "Provide an overall summary of this codebase:"
    }

    fn max_new_tokens(&self) -> u32 {
        1024
    }

    fn render(&self, task_instructions: &str, subject: &str) -> PromptScript {
        let budget = self.max_new_tokens();
        let mut script = PromptScript::new()
            .system(
                "You are a helpful assistant specialized in providing overall summaries of codebases.",
            )
            .user(format!("{}\n\n{}", task_instructions, subject))
            .text(SUMMARY_RATING_INSTRUCTIONS)
            .text("2. Describe what this file is all about.\n")
            .assistant(format!("{}\n", SUMMARY_ANCHOR));

        for i in 0..SUMMARY_SYMBOL_COUNT {
            script = script
                .text("\n")
                .gen(SlotSpec::new(format!("answer_{}", i), budget).regex(SYMBOL_PATTERN))
                .gen(SlotSpec::new(format!("answer_{}_2", i), budget).stop(StopCondition::newline()));
        }

        script.gen(SlotSpec::new("final", 1024))
    }
}

/// Abstract pythonic pseudocode inside a fenced block.
#[derive(Debug, Clone, Copy, Default)]
pub struct PseudocodeTemplate;

impl PromptTemplate for PseudocodeTemplate {
    fn name(&self) -> &'static str {
        "pseudocode"
    }

    fn anchor(&self) -> &'static str {
        PSEUDOCODE_ANCHOR
    }

    // The fence follows the anchor, so splitting there leaves only the code.
    fn extraction_marker(&self) -> &'static str {
        PSEUDOCODE_FENCE
    }

    fn default_instructions(&self) -> &'static str {
        "Generate high-level pseudocode for this code:"
    }

    fn max_new_tokens(&self) -> u32 {
        2048
    }

    fn render(&self, task_instructions: &str, subject: &str) -> PromptScript {
        PromptScript::new()
            .system("You are a helpful assistant specialized in generating high-level pythonic pseudocode.")
            .user(format!("{}\n\n{}", task_instructions, subject))
            .text("Rewrite above high-level logic in pythonic pseudocode with comments. Be very abstract and informative.")
            .assistant(format!("{}\n", PSEUDOCODE_ANCHOR))
            .text(format!("{}\n", PSEUDOCODE_FENCE))
            .gen(
                SlotSpec::new("long_answer", self.max_new_tokens())
                    .stop(StopCondition::AnyOf(vec![
                        "```".to_string(),
                        CHATML_END_OF_TURN.to_string(),
                    ])),
            )
    }
}

pub const NO_IMPORTS: &str = "No imports found.";

/// List the lines of `content` that start with `import` or `from`.
///
/// Runs locally and never touches the backend.
pub fn scan_imports(content: &str) -> String {
    let import_lines: Vec<&str> = content
        .split('\n')
        .filter(|line| line.starts_with("import") || line.starts_with("from"))
        .collect();

    if import_lines.is_empty() {
        NO_IMPORTS.to_string()
    } else {
        format!("Imports found:\n{}", import_lines.join("\n"))
    }
}
