use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;
use transcoder::{
    config::ConvertConfig,
    mode::ExecutionMode,
    run::{self, RunOptions},
    transcode::Transcoder,
};

const AFTER_HELP: &str = "\
Features:
  - Supports recursive directory traversal (-r)
  - Filters by file extension (--ext)
  - Writes output as <original_name>-converted.mp4 in the same folder
  - Uses a temporary file until successful completion to avoid partial outputs
  - Skips files that already have -converted.mp4 (unless --reprocess is used)
  - Supports --delete to remove source files after success or if -converted.mp4 already exists
  - Defaults to dry-run unless --commit (-c) is passed
  - Prints a summary after execution (or simulated summary in dry-run)

Examples:
  hbconvert --start . --ext mkv -r             # Dry-run, recursively find all .mkv files
  hbconvert --start ~/Videos --ext avi -r -c   # Actually transcode recursively
  hbconvert --start . --ext mkv -c --delete    # Transcode and delete source after success
  hbconvert --start . --ext mkv --reprocess    # Re-transcode even if output exists (dry-run)
  hbconvert --start . --ext mkv -c --delete    # Can be re-run to clean up sources afterward";

/// Batch transcode video files using HandBrakeCLI
#[derive(Parser, Debug)]
#[command(name = "hbconvert", author, version, about, long_about = None, after_help = AFTER_HELP)]
struct Args {
    /// Start path
    #[arg(long, default_value = ".")]
    start: PathBuf,

    /// File extension to target
    #[arg(long, default_value = "mkv")]
    ext: String,

    /// Recursively search subdirectories
    #[arg(short = 'r', short_alias = 'R')]
    recursive: bool,

    /// Reprocess files even if output exists
    #[arg(long)]
    reprocess: bool,

    /// Delete source files after transcoding or if already converted
    #[arg(long)]
    delete: bool,

    /// Actually perform changes (dry-run otherwise)
    #[arg(short, long)]
    commit: bool,

    /// Path to configuration file (JSON or TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            start: self.start.clone(),
            ext: self.ext.clone(),
            recursive: self.recursive,
            reprocess: self.reprocess,
            delete: self.delete,
            mode: ExecutionMode::from_commit_flag(self.commit),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise keep the console clean unless -v
    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    let cfg = ConvertConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    debug!("Configuration loaded: {:?}", cfg);

    let opts = args.run_options();
    info!("Encoder: {}", cfg.encoder_bin.display());

    let transcoder = Transcoder::from_config(&cfg);
    let report = run::run(&opts, &transcoder)
        .await
        .with_context(|| format!("Cannot scan {}", opts.start.display()))?;

    println!("\n{}", report.render(opts.mode));
    Ok(())
}
