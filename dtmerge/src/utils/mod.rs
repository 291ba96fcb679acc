//! Utilities for input path collection and output naming.

use crate::{Result, error::DtMergeError, source};
use std::path::{Path, PathBuf};

/// Expand multiple glob patterns into filesystem paths.
///
/// Patterns that match nothing are kept as literal paths so that a missing
/// file is reported by the reader instead of silently disappearing.
///
/// # Errors
///
/// Returns an error if a pattern is malformed or a directory cannot be read
/// while matching.
pub fn collect_paths_for_patterns<T>(patterns: T) -> Result<Vec<PathBuf>>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    let mut resolved_paths = Vec::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let matches = collect_paths_for_pattern(pattern)?;
        if matches.is_empty() {
            resolved_paths.push(PathBuf::from(pattern));
        } else {
            resolved_paths.extend(matches);
        }
    }

    Ok(resolved_paths)
}

/// Expand a single glob pattern into filesystem paths, sorted by name.
fn collect_paths_for_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern)
        .map_err(|err| DtMergeError::invalid_config(format!("Invalid pattern '{pattern}': {err}")))?;

    let mut resolved_paths = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| DtMergeError::other(err.to_string()))?;
        resolved_paths.push(path);
    }

    Ok(resolved_paths)
}

/// Split paths into supported sources and ignored files, keeping order.
pub fn partition_supported(paths: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
    paths.into_iter().partition(|path| source::is_supported(path))
}

/// Force a TIFF extension onto an output path.
///
/// Paths already ending in `.tif` or `.tiff` (any case) are returned
/// unchanged; anything else gets its extension replaced with `.tif`.
pub fn normalize_output_path(path: &Path) -> PathBuf {
    let is_tiff = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| source::RASTER_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    if is_tiff {
        path.to_path_buf()
    } else {
        path.with_extension("tif")
    }
}

/// Format file size as human-readable string.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}
