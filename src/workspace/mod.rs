//! Workspace access: finding and reading the files to analyze, and cleaning
//! up rendered documents afterwards.

mod cleanup;
mod scanner;
#[cfg(test)]
mod tests;

pub use cleanup::strip_markers;
pub use scanner::{
    enumerate_files, load_sources, relative_path, ScanOptions, SourceFile, RENDERED_EXTENSION,
    STRUCTURED_EXTENSION,
};
