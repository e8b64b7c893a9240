use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use crate::error::ConvertError;
use log::{debug, info, warn};

/// Normalize a user-supplied extension: `".mkv"` and `"mkv"` both mean `mkv`
pub fn normalize_extension(ext: &str) -> Result<String, ConvertError> {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() || trimmed.contains(|c: char| c == '/' || c == '\\') {
        return Err(ConvertError::InvalidExtension(ext.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Check whether a file name carries the `.<ext>` suffix.
///
/// Case-sensitive exact suffix match. A bare `.<ext>` with nothing in front of
/// it is not a match.
pub fn matches_extension(file_name: &str, ext: &str) -> bool {
    file_name
        .strip_suffix(ext)
        .and_then(|rest| rest.strip_suffix('.'))
        .is_some_and(|stem| !stem.is_empty())
}

/// Resolve the start path, failing if it is missing or not a directory
pub fn resolve_root(root: &Path) -> Result<PathBuf, ConvertError> {
    if !root.exists() {
        return Err(ConvertError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ConvertError::RootNotDirectory(root.to_path_buf()));
    }
    root.canonicalize().map_err(|source| ConvertError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })
}

/// Find every file under `root` whose name ends in `.<ext>`.
///
/// `ext` must already have gone through [`normalize_extension`]. Without
/// `recursive` only direct children of `root` are considered. Directory
/// symlinks are not descended into, but a symlink to a regular file is a
/// candidate. Results come back in traversal order.
pub fn find_target_files(root: &Path, ext: &str, recursive: bool) -> Result<Vec<PathBuf>, ConvertError> {
    let root = resolve_root(root)?;

    info!("Scanning directory: {} (.{}, recursive: {})", root.display(), ext, recursive);

    let mut walker = WalkDir::new(&root).follow_links(false).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut results = Vec::new();
    let mut files_checked = 0;

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error reading directory entry: {}", e);
                continue;
            }
        };

        // Follows the link, so symlinked media counts
        if !entry.path().is_file() {
            continue;
        }
        files_checked += 1;

        let name = entry.file_name().to_string_lossy();
        if matches_extension(&name, ext) {
            debug!("Found candidate: {}", entry.path().display());
            results.push(entry.into_path());
        }
    }

    info!("Scan complete: checked {} files, found {} candidates", files_checked, results.len());
    Ok(results)
}
