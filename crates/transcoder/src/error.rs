use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run before any per-file work starts.
///
/// Per-file problems never surface here; they end up in the failed set of the
/// [`RunReport`](crate::report::RunReport).
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("start path does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("start path is not a directory: {0}")]
    RootNotDirectory(PathBuf),

    #[error("failed to resolve start path {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid extension {0:?}")]
    InvalidExtension(String),
}

impl ConvertError {
    /// True for every variant that is caused by a bad `--start` value
    pub fn is_invalid_root(&self) -> bool {
        matches!(
            self,
            ConvertError::RootNotFound(_)
                | ConvertError::RootNotDirectory(_)
                | ConvertError::RootUnreadable { .. }
        )
    }
}
