//! Run identity and the per-run context passed through the pipeline.

use std::path::Path;

use chrono::{DateTime, Local};
use outliner_storage::CallLogger;
use sha2::{Digest, Sha256};

use crate::inputs::absolute_path;

/// Length of the readable prefix of a path-derived run id.
const RUN_ID_NAME_LEN: usize = 20;
/// Length of the readable prefix of a timestamped run id.
const TIMESTAMPED_NAME_LEN: usize = 30;
/// Hex digits of the path hash kept in a run id.
const RUN_ID_HASH_LEN: usize = 12;

/// State shared by every file processed in one run.
///
/// Built once by the caller and handed to the pipeline explicitly.
pub struct RunContext {
    pub run_id: String,
    pub logger: CallLogger,
}

impl RunContext {
    /// Open the call log for `run_id` under `log_root`.
    pub fn new(log_root: &Path, run_id: impl Into<String>) -> outliner_shared::Result<Self> {
        let run_id = run_id.into();
        let logger = CallLogger::new(log_root, run_id.clone())?;
        Ok(Self { run_id, logger })
    }
}

/// A run id that is stable for a given input path, so reruns append to the
/// same log files: `{name}_{sha256(abs path)[..12]}`.
pub fn run_id_from_path(path: &Path) -> String {
    let abs = absolute_path(path);
    let mut hasher = Sha256::new();
    hasher.update(abs.to_string_lossy().as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    format!(
        "{}_{}",
        readable_name(&abs, RUN_ID_NAME_LEN),
        &hash[..RUN_ID_HASH_LEN]
    )
}

/// A unique run id: `{name}_{YYYY_MM_DD_HH_MM_SS}`.
pub fn timestamped_run_id(path: &Path) -> String {
    timestamped_run_id_at(path, Local::now())
}

fn timestamped_run_id_at(path: &Path, now: DateTime<Local>) -> String {
    format!(
        "{}_{}",
        readable_name(path, TIMESTAMPED_NAME_LEN),
        now.format("%Y_%m_%d_%H_%M_%S")
    )
}

/// File stem for files, last component for directories; spaces and dashes
/// become `_`, anything else outside `[A-Za-z0-9_.]` (Unicode letters and
/// digits allowed) is dropped.
fn readable_name(path: &Path, max_chars: usize) -> String {
    let name = if path.is_file() {
        path.file_stem()
    } else {
        path.file_name()
    };

    name.map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        .take(max_chars)
        .collect()
}
