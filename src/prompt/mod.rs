//! Prompt construction and answer extraction.
//!
//! Templates render into a [`PromptScript`]: role-tagged turns interleaved
//! with generation slots. The pipeline fills the slots one by one against
//! the backend, producing a [`Transcript`] the extractor splits at the
//! template's marker.

mod extract;
mod slot;
mod templates;
mod transcript;

pub use extract::extract;
pub use slot::SlotSpec;
pub use templates::{
    scan_imports, HighlightTemplate, OverallSummaryTemplate, PromptTemplate, PseudocodeTemplate,
};
pub use transcript::{ChatTemplate, PromptScript, Role, Step, Transcript, Turn, CHATML_END_OF_TURN};

#[cfg(test)]
pub use templates::{NO_IMPORTS, PSEUDOCODE_ANCHOR, SYMBOL_PATTERN};
