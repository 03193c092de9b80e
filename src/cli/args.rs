use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{
    AnalysisMode, AnalysisOptions, BackendConfig, RetryPolicy, DEFAULT_CONCURRENCY,
    DEFAULT_MAX_FILE_BYTES, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS,
};
use crate::prompt::CHATML_END_OF_TURN;

/// codedigest - summarize a codebase file by file with a local SGLang runtime
#[derive(Parser, Debug)]
#[command(name = "codedigest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze every file under a directory and write the documents
    Convert(ConvertArgs),
    /// Rebuild the directory digest from existing structured documents
    Digest(DigestArgs),
    /// Remove end-of-turn markers from rendered documents
    StripMarkers(StripMarkersArgs),
}

/// Where the generation runtime is and how patient to be with it.
#[derive(Args, Debug)]
pub struct BackendArgs {
    /// Runtime port on localhost
    #[arg(long = "port", env = "CODEDIGEST_PORT")]
    pub port_flag: Option<u16>,

    /// Full runtime URL (overrides the port)
    #[arg(long, env = "CODEDIGEST_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "CODEDIGEST_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Retries on connection errors, timeouts and overloaded responses
    #[arg(long, default_value_t = 3)]
    pub max_retries: usize,
}

impl BackendArgs {
    /// A positional port wins over `--port` and the environment.
    pub fn to_config(&self, positional_port: Option<u16>) -> Result<BackendConfig> {
        let port = positional_port.or(self.port_flag).unwrap_or(DEFAULT_PORT);
        let retry = RetryPolicy {
            max_retries: self.max_retries,
            ..RetryPolicy::default()
        };
        Ok(BackendConfig::resolve(self.backend_url.as_deref(), port)?
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retry(retry))
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// One file at a time
    Single,
    /// Concurrent batches across all files
    Batch,
}

impl From<ModeArg> for AnalysisMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => AnalysisMode::Single,
            ModeArg::Batch => AnalysisMode::Batch,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Directory to analyze
    pub codebase_dir: PathBuf,

    /// Where the documents go (created if missing)
    pub output_directory: PathBuf,

    /// Runtime port on localhost
    pub port: Option<u16>,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[arg(long, value_enum, default_value_t = ModeArg::Batch)]
    pub mode: ModeArg,

    /// Pipelines in flight in batch mode
    #[arg(long, env = "CODEDIGEST_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Honour .gitignore and skip hidden files
    #[arg(long)]
    pub respect_ignore: bool,

    /// Skip files larger than this many bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_BYTES)]
    pub max_file_bytes: u64,

    /// Strip end-of-turn markers from the rendered documents afterwards
    #[arg(long)]
    pub strip_markers: bool,
}

impl ConvertArgs {
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            mode: self.mode.into(),
            concurrency: self.concurrency.max(1),
            max_file_bytes: self.max_file_bytes,
            respect_ignore: self.respect_ignore,
            ..AnalysisOptions::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct DigestArgs {
    /// Directory that was analyzed
    pub codebase_dir: PathBuf,

    /// Output directory of the earlier run
    pub output_directory: PathBuf,

    /// Runtime port on localhost
    pub port: Option<u16>,

    #[command(flatten)]
    pub backend: BackendArgs,

    /// Honour .gitignore and skip hidden files (must match the earlier run)
    #[arg(long)]
    pub respect_ignore: bool,

    /// Skip files larger than this many bytes (must match the earlier run)
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_BYTES)]
    pub max_file_bytes: u64,
}

impl DigestArgs {
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            max_file_bytes: self.max_file_bytes,
            respect_ignore: self.respect_ignore,
            ..AnalysisOptions::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct StripMarkersArgs {
    /// Folder to clean up
    pub folder: PathBuf,

    /// Literal marker to remove
    #[arg(long, default_value = CHATML_END_OF_TURN)]
    pub marker: String,

    /// Only files with this extension are touched
    #[arg(long, default_value = "md")]
    pub extension: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_convert_positional_port() {
        let cli = Cli::try_parse_from(["codedigest", "convert", "src", "out", "31000"]).unwrap();
        let Commands::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.port, Some(31000));
        assert_eq!(args.mode, ModeArg::Batch);

        let config = args.backend.to_config(args.port).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:31000/");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_convert_options() {
        let cli = Cli::try_parse_from([
            "codedigest",
            "convert",
            "src",
            "out",
            "--mode",
            "single",
            "--concurrency",
            "0",
            "--max-retries",
            "0",
            "--backend-url",
            "http://gpu:8000",
            "--strip-markers",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert!(args.strip_markers);

        let options = args.analysis_options();
        assert_eq!(options.mode, AnalysisMode::Single);
        assert_eq!(options.concurrency, 1);

        let config = args.backend.to_config(args.port).unwrap();
        assert_eq!(config.base_url.as_str(), "http://gpu:8000/");
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn test_strip_markers_defaults() {
        let cli = Cli::try_parse_from(["codedigest", "strip-markers", "out"]).unwrap();
        let Commands::StripMarkers(args) = cli.command else {
            panic!("expected strip-markers");
        };
        assert_eq!(args.marker, "<|im_end|>");
        assert_eq!(args.extension, "md");
    }

    #[test]
    fn test_convert_requires_paths() {
        assert!(Cli::try_parse_from(["codedigest", "convert", "src"]).is_err());
    }
}
