use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use crate::config::ConvertConfig;
use crate::mode::ExecutionMode;
use crate::paths;

/// Encoder output lines starting with this marker are progress updates
pub const PROGRESS_PREFIX: &str = "Encoding:";

/// Fixed encode settings: x264, constant quality 20, 160 kbps audio, web-optimized mp4
pub const ENCODER_PRESET_ARGS: &[&str] = &["-e", "x264", "-q", "20", "-B", "160", "--optimize"];

/// Something the transcoder wants the caller to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeEvent {
    /// Dry-run: the transcode that would have happened
    WouldTranscode { source: PathBuf, output: PathBuf },
    /// A progress line from the encoder, trimmed
    Progress(String),
}

/// Result of a single transcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    /// Output artifact is in place (or would be, in dry-run)
    Success,
    /// Nothing was promoted; the temp file has been cleaned up
    Failed { reason: String },
}

impl TranscodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TranscodeOutcome::Success)
    }
}

/// Splits a byte stream into lines on `\n` and `\r`.
///
/// HandBrakeCLI redraws its progress line with bare carriage returns, so `\r`
/// has to terminate a line as well. Empty segments are dropped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Feed a chunk, returning every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if let Some(line) = self.take() {
                    lines.push(line);
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Flush whatever is left once the stream hits EOF
    pub fn finish(&mut self) -> Option<String> {
        self.take()
    }

    fn take(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

/// Build the encoder argument list for one file
pub fn encoder_args(source: &Path, temp_output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-i".into(),
        source.as_os_str().to_owned(),
        "-o".into(),
        temp_output.as_os_str().to_owned(),
    ];
    args.extend(ENCODER_PRESET_ARGS.iter().map(OsString::from));
    args
}

/// Runs the external encoder for one file at a time
#[derive(Debug, Clone)]
pub struct Transcoder {
    encoder_bin: PathBuf,
}

impl Transcoder {
    pub fn new(encoder_bin: impl Into<PathBuf>) -> Self {
        Self {
            encoder_bin: encoder_bin.into(),
        }
    }

    pub fn from_config(cfg: &ConvertConfig) -> Self {
        Self::new(cfg.encoder_bin.clone())
    }

    /// Transcode `source` into `output`.
    ///
    /// In commit mode the encoder writes to the temp path and the result is
    /// renamed onto `output` only after a zero exit. Any failure (non-zero
    /// exit, spawn error, pipe error, rename error) removes the temp file and
    /// comes back as [`TranscodeOutcome::Failed`]; this never returns an error.
    pub async fn transcode<F>(
        &self,
        source: &Path,
        output: &Path,
        mode: ExecutionMode,
        mut on_event: F,
    ) -> TranscodeOutcome
    where
        F: FnMut(TranscodeEvent),
    {
        if mode.is_dry_run() {
            on_event(TranscodeEvent::WouldTranscode {
                source: source.to_path_buf(),
                output: output.to_path_buf(),
            });
            return TranscodeOutcome::Success;
        }

        let temp_output = paths::temp_output_path(output);
        match self.encode_and_promote(source, output, &temp_output, &mut on_event).await {
            Ok(()) => TranscodeOutcome::Success,
            Err(e) => {
                remove_temp(&temp_output);
                TranscodeOutcome::Failed {
                    reason: format!("{:#}", e),
                }
            }
        }
    }

    async fn encode_and_promote<F>(
        &self,
        source: &Path,
        output: &Path,
        temp_output: &Path,
        on_event: &mut F,
    ) -> Result<()>
    where
        F: FnMut(TranscodeEvent),
    {
        let args = encoder_args(source, temp_output);
        debug!("Executing encoder: {} {:?}", self.encoder_bin.display(), args);

        let mut child = Command::new(&self.encoder_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!(
                "Failed to spawn encoder at: {}. Ensure HandBrakeCLI is installed and accessible.",
                self.encoder_bin.display()
            ))?;

        let mut stdout = child.stdout.take()
            .ok_or_else(|| anyhow!("Failed to capture encoder stdout"))?;
        let mut stderr = child.stderr.take()
            .ok_or_else(|| anyhow!("Failed to capture encoder stderr"))?;

        // Both pipes feed one line stream, like `2>&1`
        let mut out_lines = LineSplitter::default();
        let mut err_lines = LineSplitter::default();
        let mut out_buf = [0u8; 8192];
        let mut err_buf = [0u8; 8192];
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            tokio::select! {
                read = stdout.read(&mut out_buf), if out_open => {
                    let n = read.context("Failed to read encoder stdout")?;
                    if n == 0 {
                        out_open = false;
                        if let Some(line) = out_lines.finish() {
                            handle_line(&line, on_event);
                        }
                    } else {
                        for line in out_lines.push(&out_buf[..n]) {
                            handle_line(&line, on_event);
                        }
                    }
                }
                read = stderr.read(&mut err_buf), if err_open => {
                    let n = read.context("Failed to read encoder stderr")?;
                    if n == 0 {
                        err_open = false;
                        if let Some(line) = err_lines.finish() {
                            handle_line(&line, on_event);
                        }
                    } else {
                        for line in err_lines.push(&err_buf[..n]) {
                            handle_line(&line, on_event);
                        }
                    }
                }
            }
        }

        let status = child.wait().await.context("Failed to wait for encoder process")?;
        if !status.success() {
            match status.code() {
                Some(code) => bail!("encoder exited with code {}", code),
                None => bail!("encoder was terminated by a signal"),
            }
        }

        if !temp_output.exists() {
            bail!("encoder reported success but wrote no output: {}", temp_output.display());
        }

        std::fs::rename(temp_output, output)
            .with_context(|| format!(
                "Failed to rename {} -> {}",
                temp_output.display(),
                output.display()
            ))?;

        debug!("Promoted {} -> {}", temp_output.display(), output.display());
        Ok(())
    }
}

fn handle_line<F>(line: &str, on_event: &mut F)
where
    F: FnMut(TranscodeEvent),
{
    if line.starts_with(PROGRESS_PREFIX) {
        on_event(TranscodeEvent::Progress(line.trim().to_string()));
    } else {
        debug!("encoder: {}", line);
    }
}

/// Remove a partial encode, logging instead of failing
fn remove_temp(temp_output: &Path) {
    if temp_output.exists() {
        match std::fs::remove_file(temp_output) {
            Ok(()) => debug!("Removed partial output: {}", temp_output.display()),
            Err(e) => warn!("Failed to remove partial output {}: {}", temp_output.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splitter_handles_carriage_returns() {
        let mut splitter = LineSplitter::default();
        let lines = splitter.push(b"Encoding: task 1 of 1, 1.00 %\rEncoding: task 1 of 1, 2.00 %\r");
        assert_eq!(
            lines,
            vec!["Encoding: task 1 of 1, 1.00 %", "Encoding: task 1 of 1, 2.00 %"]
        );
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_splitter_keeps_partial_lines_across_chunks() {
        let mut splitter = LineSplitter::default();
        assert!(splitter.push(b"Encod").is_empty());
        assert_eq!(splitter.push(b"ing: 5 %\r\nnext"), vec!["Encoding: 5 %"]);
        assert_eq!(splitter.finish(), Some("next".to_string()));
    }

    #[test]
    fn test_encoder_args_are_fixed() {
        let args = encoder_args(Path::new("/m/a.mkv"), Path::new("/m/a-converted.tmp.mp4"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "-i", "/m/a.mkv", "-o", "/m/a-converted.tmp.mp4",
                "-e", "x264", "-q", "20", "-B", "160", "--optimize",
            ]
        );
    }

    #[test]
    fn test_progress_lines_only() {
        let mut events = Vec::new();
        let mut sink = |e: TranscodeEvent| events.push(e);
        handle_line("HandBrake has exited.", &mut sink);
        handle_line("Encoding: task 1 of 1, 42.00 % ", &mut sink);
        handle_line("  Encoding: indented lines are not progress", &mut sink);
        assert_eq!(
            events,
            vec![TranscodeEvent::Progress("Encoding: task 1 of 1, 42.00 %".to_string())]
        );
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.mkv");
        std::fs::write(&src, b"source").unwrap();
        let dst = paths::output_path(&src);

        // A binary that cannot exist: dry-run must never try to spawn it
        let transcoder = Transcoder::new(dir.path().join("no-such-encoder"));
        let mut events = Vec::new();
        let outcome = transcoder
            .transcode(&src, &dst, ExecutionMode::DryRun, |e| events.push(e))
            .await;

        assert!(outcome.is_success());
        assert_eq!(events, vec![TranscodeEvent::WouldTranscode { source: src.clone(), output: dst.clone() }]);
        assert!(!dst.exists());
        assert!(!paths::temp_output_path(&dst).exists());
    }

    #[tokio::test]
    async fn test_missing_encoder_is_a_failure_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.mkv");
        std::fs::write(&src, b"source").unwrap();
        let dst = paths::output_path(&src);

        let transcoder = Transcoder::new(dir.path().join("no-such-encoder"));
        let outcome = transcoder.transcode(&src, &dst, ExecutionMode::Commit, |_| {}).await;

        match outcome {
            TranscodeOutcome::Failed { reason } => assert!(reason.contains("Failed to spawn encoder")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!dst.exists());
        assert!(!paths::temp_output_path(&dst).exists());
    }

    #[cfg(unix)]
    mod with_fake_encoder {
        use crate::mode::ExecutionMode;
        use crate::paths;
        use crate::transcode::{TranscodeEvent, TranscodeOutcome, Transcoder, ENCODER_PRESET_ARGS};
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};

        const ARG_PARSER: &str = r#"input=""; out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    -i) input="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
"#;

        fn write_encoder(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-handbrake.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{}{}", ARG_PARSER, body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn setup() -> (tempfile::TempDir, tempfile::TempDir, PathBuf, PathBuf) {
            let media = tempfile::tempdir().unwrap();
            let bin = tempfile::tempdir().unwrap();
            let src = media.path().join("a.mkv");
            std::fs::write(&src, vec![7u8; 4096]).unwrap();
            let dst = paths::output_path(&src);
            (media, bin, src, dst)
        }

        #[tokio::test]
        async fn test_success_promotes_temp_file() {
            let (_media, bin, src, dst) = setup();
            let encoder = write_encoder(
                bin.path(),
                "printf 'HandBrake starting\\nEncoding: task 1 of 1, 50.00 %%\\r'\n\
                 printf 'Encoding: task 1 of 1, 100.00 %%\\n' >&2\n\
                 printf 'encoded' > \"$out\"\nexit 0\n",
            );

            let mut progress = Vec::new();
            let outcome = Transcoder::new(encoder)
                .transcode(&src, &dst, ExecutionMode::Commit, |e| {
                    if let TranscodeEvent::Progress(line) = e {
                        progress.push(line);
                    }
                })
                .await;

            assert_eq!(outcome, TranscodeOutcome::Success);
            assert_eq!(std::fs::read(&dst).unwrap(), b"encoded");
            assert!(!paths::temp_output_path(&dst).exists());
            assert!(src.exists());
            progress.sort();
            assert_eq!(
                progress,
                vec!["Encoding: task 1 of 1, 100.00 %", "Encoding: task 1 of 1, 50.00 %"]
            );
        }

        #[tokio::test]
        async fn test_encoder_receives_fixed_arguments() {
            let (_media, bin, src, dst) = setup();
            let log = bin.path().join("args.log");
            let encoder_path = bin.path().join("fake-handbrake.sh");
            std::fs::write(
                &encoder_path,
                format!(
                    "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n{}printf 'x' > \"$out\"\n",
                    log.display(),
                    ARG_PARSER
                ),
            )
            .unwrap();
            std::fs::set_permissions(&encoder_path, std::fs::Permissions::from_mode(0o755)).unwrap();

            let outcome = Transcoder::new(&encoder_path)
                .transcode(&src, &dst, ExecutionMode::Commit, |_| {})
                .await;
            assert!(outcome.is_success());

            let recorded = std::fs::read_to_string(&log).unwrap();
            let recorded: Vec<&str> = recorded.lines().collect();
            let temp = paths::temp_output_path(&dst);
            assert_eq!(recorded[0], "-i");
            assert_eq!(recorded[1], src.to_str().unwrap());
            assert_eq!(recorded[2], "-o");
            assert_eq!(recorded[3], temp.to_str().unwrap());
            assert_eq!(&recorded[4..], ENCODER_PRESET_ARGS);
        }

        #[tokio::test]
        async fn test_non_zero_exit_removes_partial_output() {
            let (_media, bin, src, dst) = setup();
            let encoder = write_encoder(bin.path(), "printf 'partial' > \"$out\"\nexit 3\n");

            let outcome = Transcoder::new(encoder)
                .transcode(&src, &dst, ExecutionMode::Commit, |_| {})
                .await;

            match outcome {
                TranscodeOutcome::Failed { reason } => assert!(reason.contains("exited with code 3")),
                other => panic!("expected failure, got {:?}", other),
            }
            assert!(!dst.exists());
            assert!(!paths::temp_output_path(&dst).exists());
        }

        #[tokio::test]
        async fn test_zero_exit_without_output_is_a_failure() {
            let (_media, bin, src, dst) = setup();
            let encoder = write_encoder(bin.path(), "exit 0\n");

            let outcome = Transcoder::new(encoder)
                .transcode(&src, &dst, ExecutionMode::Commit, |_| {})
                .await;

            assert!(!outcome.is_success());
            assert!(!dst.exists());
        }

        #[tokio::test]
        async fn test_failure_keeps_existing_artifact() {
            let (_media, bin, src, dst) = setup();
            std::fs::write(&dst, b"previous good encode").unwrap();
            let encoder = write_encoder(bin.path(), "printf 'garbage' > \"$out\"\nexit 1\n");

            let outcome = Transcoder::new(encoder)
                .transcode(&src, &dst, ExecutionMode::Commit, |_| {})
                .await;

            assert!(!outcome.is_success());
            assert_eq!(std::fs::read(&dst).unwrap(), b"previous good encode");
            assert!(!paths::temp_output_path(&dst).exists());
        }
    }
}
