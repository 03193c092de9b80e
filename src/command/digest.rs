use anyhow::Result;

use super::connect;
use crate::cli::{existing_dir, DigestArgs};
use crate::pipeline::{Aggregator, Dispatcher};
use crate::prompt::ChatTemplate;

pub async fn run_digest(args: DigestArgs) -> Result<()> {
    let codebase_dir = existing_dir(&args.codebase_dir)?;
    let output_dir = existing_dir(&args.output_directory)?;

    let options = args.analysis_options();
    let client = connect(&args.backend.to_config(args.port)?).await?;
    let dispatcher =
        Dispatcher::new(client, ChatTemplate::chatml()).with_temperature(options.temperature);

    let rebuilt = Aggregator::new(&dispatcher, &options)
        .rebuild_digest(&codebase_dir, &output_dir, &codebase_dir)
        .await?;

    match rebuilt {
        Some(path) => println!("Digest written to {}", path.display()),
        None => println!("No files under {}; nothing to digest.", codebase_dir.display()),
    }
    Ok(())
}
