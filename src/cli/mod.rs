mod args;
mod paths;

pub use args::{Cli, Commands, ConvertArgs, DigestArgs, StripMarkersArgs};
pub use paths::{ensure_output_dir, existing_dir};
