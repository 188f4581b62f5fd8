//! Resumability queries over the call-log directory.

use std::collections::BTreeSet;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use outliner_shared::{OutlinerError, Result};
use serde::Deserialize;
use tracing::{debug, warn};

/// Aggregate view of every call log under a root directory.
#[derive(Debug, Clone, Default)]
pub struct LogStats {
    pub log_dir: PathBuf,
    /// Log files that were scanned, sorted.
    pub log_files: Vec<PathBuf>,
    pub total_calls: usize,
    pub successful_calls: usize,
    pub failed_calls: usize,
    /// File keys with at least one successful call.
    pub successful_file_keys: BTreeSet<String>,
    /// Every file key seen, successful or not.
    pub all_file_keys: BTreeSet<String>,
}

impl LogStats {
    /// Number of distinct input files that completed at least one call.
    pub fn processed_files(&self) -> usize {
        self.successful_file_keys.len()
    }

    /// File keys that only ever appear in failed calls.
    pub fn failed_file_keys(&self) -> BTreeSet<String> {
        self.all_file_keys
            .difference(&self.successful_file_keys)
            .cloned()
            .collect()
    }

    pub fn is_processed(&self, file_key: &str) -> bool {
        self.successful_file_keys.contains(file_key)
    }
}

/// The two fields resumability needs; everything else in a record is ignored.
#[derive(Debug, Deserialize)]
struct RecordOutcome {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    file_key: Option<String>,
}

/// Scan every `*.jsonl` file under `root`, recursively.
///
/// A missing root yields empty stats. Lines that are blank or not valid JSON
/// are skipped; files that cannot be read are skipped with a warning.
pub fn scan_log_dir(root: &Path) -> Result<LogStats> {
    let mut stats = LogStats {
        log_dir: root.to_path_buf(),
        ..Default::default()
    };

    if !root.exists() {
        return Ok(stats);
    }

    let mut files = Vec::new();
    collect_jsonl_files(root, &mut files)?;
    files.sort();
    files.dedup();

    for path in &files {
        if let Err(e) = scan_file(path, &mut stats) {
            warn!(path = %path.display(), error = %e, "failed to read call log, skipping");
        }
    }

    debug!(
        files = files.len(),
        total = stats.total_calls,
        succeeded = stats.successful_calls,
        "scanned call logs"
    );

    stats.log_files = files;
    Ok(stats)
}

fn scan_file(path: &Path, stats: &mut LogStats) -> Result<()> {
    let file = std::fs::File::open(path).map_err(|e| OutlinerError::io(path, e))?;

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| OutlinerError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let Ok(outcome) = serde_json::from_str::<RecordOutcome>(&line) else {
            continue;
        };

        stats.total_calls += 1;
        if outcome.success {
            stats.successful_calls += 1;
        } else {
            stats.failed_calls += 1;
        }

        if let Some(key) = outcome.file_key.filter(|k| !k.is_empty()) {
            if outcome.success {
                stats.successful_file_keys.insert(key.clone());
            }
            stats.all_file_keys.insert(key);
        }
    }

    Ok(())
}

fn collect_jsonl_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| OutlinerError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| OutlinerError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            if let Err(e) = collect_jsonl_files(&path, out) {
                warn!(path = %path.display(), error = %e, "skipping unreadable log directory");
            }
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
        {
            out.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::CallLogger;
    use crate::tests::record;

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let stats = scan_log_dir(&dir.path().join("nope")).unwrap();
        assert_eq!(stats.total_calls, 0);
        assert!(stats.log_files.is_empty());
    }

    #[test]
    fn counts_across_models_and_runs() {
        let dir = tempfile::tempdir().unwrap();
        let run_a = CallLogger::new(dir.path(), "run_a").unwrap();
        let run_b = CallLogger::new(dir.path(), "run_b").unwrap();

        run_a.log_call(&record("model/x", true, Some("k1"))).unwrap();
        run_a.log_call(&record("model/x", true, Some("k1"))).unwrap();
        run_a.log_call(&record("model-y", false, Some("k2"))).unwrap();
        run_b.log_call(&record("model-y", true, Some("k3"))).unwrap();
        run_b.log_call(&record("model-y", false, None)).unwrap();

        let stats = run_b.stats().unwrap();
        assert_eq!(stats.log_files.len(), 3);
        assert_eq!(stats.total_calls, 5);
        assert_eq!(stats.successful_calls, 3);
        assert_eq!(stats.failed_calls, 2);
        assert_eq!(stats.processed_files(), 2);
        assert!(stats.is_processed("k1"));
        assert!(stats.is_processed("k3"));
        assert_eq!(stats.all_file_keys.len(), 3);
    }

    #[test]
    fn failure_only_key_is_not_processed() {
        let dir = tempfile::tempdir().unwrap();
        let logger = CallLogger::new(dir.path(), "run").unwrap();
        logger.log_call(&record("m", false, Some("broken"))).unwrap();
        logger.log_call(&record("m", false, Some("broken"))).unwrap();

        let stats = logger.stats().unwrap();
        assert!(!stats.is_processed("broken"));
        assert_eq!(
            stats.failed_file_keys().into_iter().collect::<Vec<_>>(),
            vec!["broken".to_string()]
        );
    }

    #[test]
    fn skips_garbage_lines_and_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("model").join("deeper");
        std::fs::create_dir_all(&nested).unwrap();

        let mut f = std::fs::File::create(nested.join("old.JSONL")).unwrap();
        writeln!(f, r#"{{"success": true, "file_key": "legacy"}}"#).unwrap();
        writeln!(f, "not json").unwrap();
        writeln!(f).unwrap();
        writeln!(f, r#"{{"file_key": "no-success-field"}}"#).unwrap();

        std::fs::write(dir.path().join("notes.txt"), r#"{"success": true}"#).unwrap();

        let stats = scan_log_dir(dir.path()).unwrap();
        assert_eq!(stats.log_files.len(), 1);
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.successful_calls, 1);
        assert!(stats.is_processed("legacy"));
        assert!(!stats.is_processed("no-success-field"));
    }
}
