//! Append-only LLM call log and resumability store.
//!
//! Every LLM invocation is written as one JSON object per line to
//! `{log_root}/{model}/{run_id}.jsonl`. Scanning the whole log root tells a
//! later run which input files already finished successfully.
//!
//! **Access rules:**
//! - one [`CallLogger`] per process; it is `Send + Sync` and serializes appends
//! - several processes appending to the same file need external locking

mod scan;

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use outliner_shared::{BlockSnapshot, LlmResponse, OutlinerError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use scan::{LogStats, scan_log_dir};

/// Folder name used when a model name sanitizes to nothing.
const UNKNOWN_MODEL_DIR: &str = "unknown_model";

/// One persisted LLM invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLogRecord {
    /// When the call finished.
    pub timestamp: DateTime<Utc>,
    /// Model that answered, or the client's primary model for failed calls.
    pub model_name: String,
    /// Blocks sent in this call.
    pub batch: Vec<BlockSnapshot>,
    /// Outline lines extracted by earlier batches of the same file.
    pub history_context: String,
    /// Markdown of the current batch.
    pub current_batch_content: String,
    /// Full response, `null` when the call failed.
    pub response: Option<LlmResponse>,
    pub success: bool,
    pub error: Option<String>,
    pub latency_ms: u64,
    /// Stable identifier of the input file, used for resumability.
    pub file_key: Option<String>,
}

/// Writer for the JSONL call log.
///
/// Per-model files are opened lazily the first time a record for that model
/// arrives and stay open for the logger's lifetime.
pub struct CallLogger {
    root: PathBuf,
    run_id: String,
    handles: Mutex<LogHandles>,
}

/// Open per-model files, plus the models whose last write failed part-way.
#[derive(Default)]
struct LogHandles {
    open: HashMap<String, File>,
    torn: HashSet<String>,
}

impl LogHandles {
    /// Drop the handle after a failed write; the next record reopens the file
    /// and starts on a fresh line.
    fn mark_torn(&mut self, dir_name: &str) {
        self.open.remove(dir_name);
        self.torn.insert(dir_name.to_string());
    }
}

impl CallLogger {
    /// Create a logger rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>, run_id: impl Into<String>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| OutlinerError::io(&root, e))?;

        Ok(Self {
            root,
            run_id: run_id.into(),
            handles: Mutex::new(LogHandles::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Path of the log file records from `model_name` are appended to.
    pub fn log_path(&self, model_name: &str) -> PathBuf {
        self.root
            .join(sanitize_model_name(model_name))
            .join(format!("{}.jsonl", self.run_id))
    }

    /// Append one record and flush it to disk. Returns the file written.
    pub fn log_call(&self, record: &CallLogRecord) -> Result<PathBuf> {
        let line = serde_json::to_string(record)
            .map_err(|e| OutlinerError::Storage(format!("failed to serialize call record: {e}")))?;

        let dir_name = sanitize_model_name(&record.model_name);
        let path = self.log_path(&record.model_name);

        let mut handles = self
            .handles
            .lock()
            .map_err(|_| OutlinerError::Storage("call log lock poisoned".into()))?;

        if !handles.open.contains_key(&dir_name) {
            let file = open_append(&path)?;
            debug!(path = %path.display(), "opened call log");
            handles.open.insert(dir_name.clone(), file);
        }

        let after_tear = handles.torn.remove(&dir_name);
        let file = handles
            .open
            .get_mut(&dir_name)
            .ok_or_else(|| OutlinerError::Storage("call log handle missing".into()))?;

        if let Err(e) = write_line(file, &line, after_tear) {
            warn!(path = %path.display(), error = %e, "call log write failed, reopening on next record");
            handles.mark_torn(&dir_name);
            return Err(OutlinerError::io(&path, e));
        }

        Ok(path)
    }

    /// Scan every log under this logger's root.
    pub fn stats(&self) -> Result<LogStats> {
        scan_log_dir(&self.root)
    }
}

/// Write one JSONL line in a single call and flush it. After a torn write
/// the line is preceded by a newline so the fragment stays on its own line.
fn write_line<W: Write>(out: &mut W, line: &str, after_tear: bool) -> std::io::Result<()> {
    let mut buf = String::with_capacity(line.len() + 2);
    if after_tear {
        buf.push('\n');
    }
    buf.push_str(line);
    buf.push('\n');
    out.write_all(buf.as_bytes())?;
    out.flush()
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| OutlinerError::io(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| OutlinerError::io(path, e))
}

/// Turn a model identifier into a safe folder name.
///
/// Characters rejected by common filesystems become `_`; leading and
/// trailing dots and spaces are dropped.
pub fn sanitize_model_name(model_name: &str) -> String {
    let replaced: String = model_name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        UNKNOWN_MODEL_DIR.to_string()
    } else {
        trimmed.to_string()
    }
}
