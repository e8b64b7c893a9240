use std::fmt::Write as _;
use std::path::PathBuf;
use chrono::{DateTime, Utc};
use crate::mode::ExecutionMode;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Outcome of one pass over the candidate list.
///
/// Every candidate lands in exactly one of `processed`, `skipped` or `failed`.
/// `deleted` is a subset of processed and skipped sources.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub total: usize,
    pub processed: Vec<(PathBuf, PathBuf)>,
    pub skipped: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    /// Sources we tried and failed to delete, with the error text
    pub delete_errors: Vec<(PathBuf, String)>,
    /// Sum of (source size - output size) over committed transcodes; can go negative
    pub total_saved: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Signed difference between source and output sizes
pub fn saved_bytes(source_size: u64, output_size: u64) -> i64 {
    (i128::from(source_size) - i128::from(output_size))
        .clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Bytes to megabytes with two decimals, e.g. `40.00 MB`
pub fn format_megabytes(bytes: i64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}

/// Format a duration as `Hh Mm Ss`
pub fn format_duration(d: chrono::Duration) -> String {
    let hours = d.num_hours();
    let minutes = d.num_minutes() % 60;
    let seconds = d.num_seconds() % 60;
    format!("{}h {}m {}s", hours, minutes, seconds)
}

impl RunReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn record_processed(&mut self, source: PathBuf, output: PathBuf) {
        self.processed.push((source, output));
    }

    pub fn record_skipped(&mut self, source: PathBuf) {
        self.skipped.push(source);
    }

    pub fn record_failed(&mut self, source: PathBuf) {
        self.failed.push(source);
    }

    pub fn record_deleted(&mut self, source: PathBuf) {
        self.deleted.push(source);
    }

    pub fn record_delete_error(&mut self, source: PathBuf, error: String) {
        self.delete_errors.push((source, error));
    }

    /// Add one file's savings to the running total
    pub fn add_savings(&mut self, source_size: u64, output_size: u64) -> i64 {
        let saved = saved_bytes(source_size, output_size);
        self.total_saved = self.total_saved.saturating_add(saved);
        saved
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn elapsed(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Render the end-of-run summary
    pub fn render(&self, mode: ExecutionMode) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "SUMMARY");
        let _ = writeln!(out, "=======");
        let _ = writeln!(out, "Processed ({}):", self.processed.len());
        for (src, dst) in &self.processed {
            let _ = writeln!(out, "  {} -> {}", src.display(), dst.display());
        }

        for (label, files) in [
            ("Skipped", &self.skipped),
            ("Deleted", &self.deleted),
            ("Failed", &self.failed),
        ] {
            let _ = writeln!(out, "\n{} ({}):", label, files.len());
            for file in files {
                let _ = writeln!(out, "  {}", file.display());
            }
        }

        if !self.delete_errors.is_empty() {
            let _ = writeln!(out, "\nDelete errors ({}):", self.delete_errors.len());
            for (file, error) in &self.delete_errors {
                let _ = writeln!(out, "  {}: {}", file.display(), error);
            }
        }

        match mode {
            ExecutionMode::Commit => {
                let _ = writeln!(out, "\nTotal space saved: {}", format_megabytes(self.total_saved));
            }
            ExecutionMode::DryRun => {
                let _ = writeln!(out, "\n(DRY RUN - no files were modified. Use -c to commit changes.)");
            }
        }

        if let Some(elapsed) = self.elapsed() {
            let _ = writeln!(out, "Elapsed: {}", format_duration(elapsed));
        }

        out
    }
}
