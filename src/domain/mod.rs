//! Domain types shared across modules.
//!
//! The analysis pipeline produces these; the output writers and the
//! digest rebuild consume them.

use serde::{Deserialize, Serialize};

/// The four analyses of one source file.
///
/// Field names are the structured document's keys. Every field is required
/// when reading a document back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub highlights: String,
    pub overall_summary: String,
    pub pseudocode: String,
    pub import_relationships: String,
}

/// Second-pass summary of everything under one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryDigest {
    /// Directory path relative to the codebase root ("" for the root).
    pub directory: String,
    pub overall_summary: String,
}
