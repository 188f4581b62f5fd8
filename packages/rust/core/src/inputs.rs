//! Input file discovery, selection, and identity.

use std::path::{Path, PathBuf};

use outliner_shared::{OutlinerError, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Canonical absolute form of `path`, falling back to a lexical absolute path
/// when it cannot be resolved.
pub fn absolute_path(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Stable identifier of an input file: SHA-256 hex of its absolute path.
pub fn file_key(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(absolute_path(path).to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Resolve the input path to the list of OCR JSON files to process.
///
/// A file must have a `.json` extension. A directory is searched
/// recursively; the result is sorted and deduplicated.
pub fn find_input_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(OutlinerError::validation(format!(
            "input path does not exist: {}",
            path.display()
        )));
    }

    if path.is_file() {
        if !is_json(path) {
            return Err(OutlinerError::validation(format!(
                "expected a .json file: {}",
                path.display()
            )));
        }
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    collect_json_files(path, &mut files)?;
    files.sort();
    files.dedup();

    if files.is_empty() {
        return Err(OutlinerError::validation(format!(
            "no .json files found under {}",
            path.display()
        )));
    }

    debug!(root = %path.display(), count = files.len(), "found input files");
    Ok(files)
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| OutlinerError::io(dir, e))?;

    for entry in entries {
        let path = entry.map_err(|e| OutlinerError::io(dir, e))?.path();
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if is_json(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Apply `--start` / `--end` to the file list (half-open, 0-based).
///
/// A negative start is clamped to 0 and an end past the list to its length,
/// each with a warning. A start at or past the end of the list, or an end not
/// after the start, is an error.
pub fn select_range(files: Vec<PathBuf>, start: Option<i64>, end: Option<i64>) -> Result<Vec<PathBuf>> {
    if start.is_none() && end.is_none() {
        return Ok(files);
    }

    let count = files.len();
    let mut start_idx = start.unwrap_or(0);
    let mut end_idx = end.unwrap_or(count as i64);

    if start_idx < 0 {
        warn!(start = start_idx, "start cannot be negative, using 0");
        start_idx = 0;
    }
    if start_idx >= count as i64 {
        return Err(OutlinerError::validation(format!(
            "start ({start_idx}) is beyond the number of files ({count})"
        )));
    }
    if end_idx > count as i64 {
        warn!(end = end_idx, count, "end is beyond the number of files, clamping");
        end_idx = count as i64;
    }
    if end_idx <= start_idx {
        return Err(OutlinerError::validation(format!(
            "end ({end_idx}) must be greater than start ({start_idx})"
        )));
    }

    let (start_idx, end_idx) = (start_idx as usize, end_idx as usize);
    Ok(files
        .into_iter()
        .skip(start_idx)
        .take(end_idx - start_idx)
        .collect())
}
