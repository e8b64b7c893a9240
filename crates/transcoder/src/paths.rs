use std::path::{Path, PathBuf};

/// Marker appended to the source stem to name the output artifact
pub const OUTPUT_MARKER: &str = "-converted";

/// Container extension of every output the encoder writes
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Extension given to the in-flight encode, replacing `OUTPUT_EXTENSION`
pub const TEMP_EXTENSION: &str = "tmp.mp4";

/// Get the path of the finished output artifact for a source file:
/// `<dir>/<stem>-converted.mp4`
pub fn output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{}{}.{}", stem, OUTPUT_MARKER, OUTPUT_EXTENSION))
}

/// Get the path the encoder writes to before the result is promoted:
/// `<dir>/<stem>-converted.tmp.mp4`
pub fn temp_output_path(output: &Path) -> PathBuf {
    let mut path = output.to_path_buf();
    path.set_extension(TEMP_EXTENSION);
    path
}

/// Check if an output artifact already exists for a source file
pub fn has_output(source: &Path) -> bool {
    output_path(source).exists()
}
