use std::io::Write;
use std::path::{Path, PathBuf};
use humansize::{format_size, DECIMAL};
use log::{debug, info, warn};
use crate::error::ConvertError;
use crate::mode::ExecutionMode;
use crate::paths;
use crate::report::RunReport;
use crate::scan;
use crate::transcode::{TranscodeEvent, TranscodeOutcome, Transcoder};

/// Everything one pass needs to know, straight from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub start: PathBuf,
    pub ext: String,
    pub recursive: bool,
    pub reprocess: bool,
    pub delete: bool,
    pub mode: ExecutionMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            start: PathBuf::from("."),
            ext: "mkv".to_string(),
            recursive: false,
            reprocess: false,
            delete: false,
            mode: ExecutionMode::DryRun,
        }
    }
}

/// Scan `opts.start` and process every candidate in order.
///
/// Only a bad start path (or extension) is an error; every per-file problem is
/// recorded in the returned report and the pass carries on.
pub async fn run(opts: &RunOptions, transcoder: &Transcoder) -> Result<RunReport, ConvertError> {
    let ext = scan::normalize_extension(&opts.ext)?;
    let targets = scan::find_target_files(&opts.start, &ext, opts.recursive)?;

    let total = targets.len();
    let mut report = RunReport::new(total);

    println!("\nFound {} .{} file(s) to check.", total, ext);
    info!(
        "Run starting: {} candidate(s), mode: {:?}, reprocess: {}, delete: {}",
        total, opts.mode, opts.reprocess, opts.delete
    );

    for (i, source) in targets.into_iter().enumerate() {
        process_file(opts, transcoder, &mut report, source, i + 1, total).await;
    }

    report.finish();
    info!(
        "Run finished: {} processed, {} skipped, {} failed, {} deleted",
        report.processed.len(),
        report.skipped.len(),
        report.failed.len(),
        report.deleted.len()
    );
    Ok(report)
}

async fn process_file(
    opts: &RunOptions,
    transcoder: &Transcoder,
    report: &mut RunReport,
    source: PathBuf,
    index: usize,
    total: usize,
) {
    let name = display_name(&source);
    let output = paths::output_path(&source);

    if paths::has_output(&source) && !opts.reprocess {
        println!("[{}/{}] Skipping (already exists): {}", index, total, name);
        report.record_skipped(source.clone());
        if opts.delete {
            delete_source(report, &source, opts.mode);
        }
        return;
    }

    let source_size = match std::fs::metadata(&source) {
        Ok(m) => m.len(),
        Err(e) => {
            println!("[{}/{}] [ERROR] Cannot read {}: {}", index, total, name, e);
            report.record_failed(source);
            return;
        }
    };
    debug!("Source size: {} ({})", source.display(), format_size(source_size, DECIMAL));

    println!("[{}/{}] Processing: {}", index, total, name);

    let mut progress_shown = false;
    let outcome = transcoder
        .transcode(&source, &output, opts.mode, |event| match event {
            TranscodeEvent::WouldTranscode { source, output } => {
                println!("[DRY RUN] Would transcode: {} -> {}", source.display(), output.display());
            }
            TranscodeEvent::Progress(line) => {
                // Redraw in place; the encoder can emit thousands of these
                print!("{}\r", line);
                let _ = std::io::stdout().flush();
                progress_shown = true;
            }
        })
        .await;

    if progress_shown {
        println!();
    }

    match outcome {
        TranscodeOutcome::Success => {
            if opts.mode.is_commit() {
                println!("[{}/{}] Done: {}", index, total, display_name(&output));
            }
            report.record_processed(source.clone(), output.clone());

            if opts.mode.is_commit() {
                match std::fs::metadata(&output) {
                    Ok(m) => {
                        let saved = report.add_savings(source_size, m.len());
                        debug!(
                            "Output size: {} ({}), saved {} bytes",
                            output.display(),
                            format_size(m.len(), DECIMAL),
                            saved
                        );
                    }
                    Err(e) => warn!("Failed to stat output {}, not counting savings: {}", output.display(), e),
                }
            }

            if opts.delete {
                delete_source(report, &source, opts.mode);
            }
        }
        TranscodeOutcome::Failed { reason } => {
            println!("[{}/{}] [ERROR] Failed to transcode {}: {}", index, total, name, reason);
            report.record_failed(source);
        }
    }
}

/// Delete a source in commit mode, or say we would in dry-run
fn delete_source(report: &mut RunReport, source: &Path, mode: ExecutionMode) {
    match mode {
        ExecutionMode::DryRun => {
            println!("[DRY RUN] Would delete: {}", source.display());
        }
        ExecutionMode::Commit => match std::fs::remove_file(source) {
            Ok(()) => {
                info!("Deleted source: {}", source.display());
                report.record_deleted(source.to_path_buf());
            }
            Err(e) => {
                warn!("Failed to delete source {}: {}", source.display(), e);
                println!("[ERROR] Failed to delete {}: {}", source.display(), e);
                report.record_delete_error(source.to_path_buf(), e.to_string());
            }
        },
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
