use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::connect;
use crate::cli::{ensure_output_dir, existing_dir, ConvertArgs};
use crate::pipeline::{Aggregator, Dispatcher};
use crate::prompt::{ChatTemplate, CHATML_END_OF_TURN};
use crate::workspace::{strip_markers, RENDERED_EXTENSION};

pub async fn run_convert(args: ConvertArgs) -> Result<()> {
    let codebase_dir = existing_dir(&args.codebase_dir)?;
    let output_dir = ensure_output_dir(&args.output_directory)?;

    let options = args.analysis_options();
    let backend_config = args.backend.to_config(args.port)?;
    let client = connect(&backend_config).await?;
    let dispatcher =
        Dispatcher::new(client, ChatTemplate::chatml()).with_temperature(options.temperature);

    info!(
        "Converting {} into {}",
        codebase_dir.display(),
        output_dir.display()
    );
    let report = Aggregator::new(&dispatcher, &options)
        .aggregate(&codebase_dir, &output_dir, &codebase_dir)
        .await?;

    if args.strip_markers {
        let stripped = strip_markers(&output_dir, CHATML_END_OF_TURN, RENDERED_EXTENSION)?;
        info!(
            "Removed {} marker(s) from {} of {} documents",
            stripped.markers_removed, stripped.files_changed, stripped.files_scanned
        );
    }

    for failure in &report.failures {
        warn!(
            "{} analysis of {} fell back to empty text: {}",
            failure.analysis, failure.relative_path, failure.error
        );
    }

    println!(
        "Analysis complete. Output is saved in {}",
        args.output_directory.display()
    );
    if let Some(digest) = &report.digest_path {
        println!("Directory digest: {}", digest.display());
    }
    if report.overwritten > 0 {
        println!(
            "{} documents were overwritten by sources with the same output name (see log).",
            report.overwritten
        );
    }
    if report.files_analyzed == 0 {
        println!("No files were found to analyze.");
    } else if !report.failures.is_empty() {
        let affected: BTreeSet<&str> = report
            .failures
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect();
        println!(
            "{} analyses failed across {} of {} files (see log).",
            report.failures.len(),
            affected.len(),
            report.files_analyzed
        );
    }

    Ok(())
}
