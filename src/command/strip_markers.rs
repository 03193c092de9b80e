use anyhow::Result;

use crate::cli::{existing_dir, StripMarkersArgs};
use crate::workspace::strip_markers;

pub async fn run_strip_markers(args: StripMarkersArgs) -> Result<()> {
    let folder = existing_dir(&args.folder)?;
    let report = strip_markers(&folder, &args.marker, &args.extension)?;

    println!(
        "Removed {} marker(s) from {} of {} .{} files in {}",
        report.markers_removed,
        report.files_changed,
        report.files_scanned,
        args.extension,
        args.folder.display()
    );
    Ok(())
}
