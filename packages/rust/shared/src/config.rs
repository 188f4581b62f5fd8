//! Application configuration for Outliner.
//!
//! User config lives at `~/.outliner/outliner.toml`.
//! Resolution order: defaults, then the config file, then `OUTLINE_*`
//! environment variables, then CLI flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OutlinerError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "outliner.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".outliner";

// ---------------------------------------------------------------------------
// Config structs (matching outliner.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Heading detection rules.
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Line building from OCR page text.
    #[serde(default)]
    pub document: DocumentConfig,

    /// Markdown page view.
    #[serde(default)]
    pub markdown: MarkdownConfig,

    /// Char-budget batching.
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Prompt template location.
    #[serde(default)]
    pub prompt: PromptConfig,

    /// LLM backend selection and settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Call-log location.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[detection]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Enable the outline-pattern rule.
    #[serde(default = "default_true")]
    pub enable_pattern: bool,

    /// Enable the marker-prefix rule.
    #[serde(default = "default_true")]
    pub enable_marker: bool,

    /// Enable the length-range rule.
    #[serde(default = "default_true")]
    pub enable_length: bool,

    /// Marker a raw line must start with for the marker-prefix rule.
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Minimum heading length in characters (inclusive).
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Maximum heading length in characters (inclusive).
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enable_pattern: true,
            enable_marker: true,
            enable_length: true,
            marker: default_marker(),
            min_length: default_min_length(),
            max_length: default_max_length(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_marker() -> String {
    "#".into()
}
fn default_min_length() -> usize {
    2
}
fn default_max_length() -> usize {
    40
}

/// `[document]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Drop whitespace-only lines instead of keeping them as records.
    #[serde(default = "default_true")]
    pub skip_empty_lines: bool,

    /// Prefix strings stripped (repeatedly) from the start of each line.
    #[serde(default = "default_prefixes")]
    pub prefixes_to_remove: Vec<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            skip_empty_lines: true,
            prefixes_to_remove: default_prefixes(),
        }
    }
}

fn default_prefixes() -> Vec<String> {
    vec!["#".into()]
}

/// `[markdown]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Characters of each heading shown in the page table before truncation.
    #[serde(default = "default_max_preview_length")]
    pub max_preview_length: usize,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            max_preview_length: default_max_preview_length(),
        }
    }
}

fn default_max_preview_length() -> usize {
    500
}

/// `[batching]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Character budget of one LLM batch.
    #[serde(default = "default_max_chars_per_batch")]
    pub max_chars_per_batch: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_chars_per_batch: default_max_chars_per_batch(),
        }
    }
}

fn default_max_chars_per_batch() -> usize {
    3000
}

/// `[prompt]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Filesystem path of the prompt template.
    #[serde(default = "default_template_path")]
    pub template_path: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template_path: default_template_path(),
        }
    }
}

fn default_template_path() -> String {
    "prompts/outline_prompt.txt".into()
}

/// LLM backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmMode {
    /// Hosted OpenAI-compatible API with backup models.
    #[default]
    #[serde(alias = "modelscope")]
    Hosted,
    /// Local OpenAI-compatible inference server.
    #[serde(alias = "vllm")]
    Local,
}

impl LlmMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for LlmMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmMode {
    type Err = OutlinerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" | "modelscope" => Ok(Self::Hosted),
            "local" | "vllm" => Ok(Self::Local),
            other => Err(OutlinerError::config(format!(
                "unknown LLM mode '{other}': expected 'hosted' or 'local'"
            ))),
        }
    }
}

/// `[llm]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Which backend to construct.
    #[serde(default)]
    pub mode: LlmMode,

    #[serde(default)]
    pub hosted: HostedLlmConfig,

    #[serde(default)]
    pub local: LocalLlmConfig,
}

/// `[llm.hosted]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedLlmConfig {
    /// OpenAI-compatible base URL.
    #[serde(default = "default_hosted_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_hosted_api_key_env")]
    pub api_key_env: String,

    /// Model tried first.
    #[serde(default = "default_primary_model")]
    pub primary_model: String,

    /// Models tried in order when the primary fails.
    #[serde(default = "default_backup_models")]
    pub backup_models: Vec<String>,

    /// Ask thinking-capable models to reason before answering.
    #[serde(default = "default_true")]
    pub enable_thinking: bool,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HostedLlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_hosted_base_url(),
            api_key_env: default_hosted_api_key_env(),
            primary_model: default_primary_model(),
            backup_models: default_backup_models(),
            enable_thinking: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_hosted_base_url() -> String {
    "https://api-inference.modelscope.cn/v1".into()
}
fn default_hosted_api_key_env() -> String {
    "MODELSCOPE_API_KEY".into()
}
fn default_primary_model() -> String {
    "ZhipuAI/GLM-4.7-Flash".into()
}
fn default_backup_models() -> Vec<String> {
    vec![
        "deepseek-ai/DeepSeek-R1-0528".into(),
        "Qwen/Qwen3-235B-A22B".into(),
        "ZhipuAI/GLM-4.7-Flash".into(),
        "meituan-longcat/LongCat-Flash-Lite".into(),
    ]
}
fn default_timeout_secs() -> u64 {
    300
}

/// `[llm.local]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalLlmConfig {
    /// OpenAI-compatible base URL of the local server.
    #[serde(default = "default_local_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key; most local servers accept any value.
    #[serde(default = "default_local_api_key_env")]
    pub api_key_env: String,

    /// Served model name.
    #[serde(default = "default_local_model")]
    pub model: String,

    #[serde(default = "default_local_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_local_temperature")]
    pub temperature: f32,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LocalLlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_local_base_url(),
            api_key_env: default_local_api_key_env(),
            model: default_local_model(),
            max_tokens: default_local_max_tokens(),
            temperature: default_local_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_local_base_url() -> String {
    "http://localhost:8000/v1".into()
}
fn default_local_api_key_env() -> String {
    "VLLM_API_KEY".into()
}
fn default_local_model() -> String {
    "Qwen3-4B-Instruct-2507".into()
}
fn default_local_max_tokens() -> u32 {
    15000
}
fn default_local_temperature() -> f32 {
    0.1
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Root directory of the LLM call logs.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

fn default_log_dir() -> String {
    "logs/llm_calls".into()
}

// ---------------------------------------------------------------------------
// Environment overrides and validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Apply `OUTLINE_*`, `DEFAULT_LLM_MODE`, `MODELSCOPE_*` and `VLLM_*`
    /// overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("OUTLINE_SKIP_EMPTY_LINES") {
            self.document.skip_empty_lines = parse_flag(&v);
        }
        if let Some(v) = lookup("OUTLINE_PREFIXES_TO_REMOVE") {
            self.document.prefixes_to_remove = split_list(&v);
        }
        if let Some(v) = lookup("OUTLINE_HEADING_ENABLE_REGEX") {
            self.detection.enable_pattern = parse_flag(&v);
        }
        if let Some(v) = lookup("OUTLINE_HEADING_ENABLE_HASH") {
            self.detection.enable_marker = parse_flag(&v);
        }
        if let Some(v) = lookup("OUTLINE_HEADING_ENABLE_LENGTH") {
            self.detection.enable_length = parse_flag(&v);
        }
        if let Some(v) = lookup("OUTLINE_HEADING_MIN_LENGTH") {
            self.detection.min_length = parse_number("OUTLINE_HEADING_MIN_LENGTH", &v)?;
        }
        if let Some(v) = lookup("OUTLINE_HEADING_MAX_LENGTH") {
            self.detection.max_length = parse_number("OUTLINE_HEADING_MAX_LENGTH", &v)?;
        }
        if let Some(v) = lookup("OUTLINE_MAX_PREVIEW_LENGTH") {
            self.markdown.max_preview_length = parse_number("OUTLINE_MAX_PREVIEW_LENGTH", &v)?;
        }
        if let Some(v) = lookup("OUTLINE_MAX_CHARS_PER_BATCH") {
            self.batching.max_chars_per_batch = parse_number("OUTLINE_MAX_CHARS_PER_BATCH", &v)?;
        }
        if let Some(v) = lookup("OUTLINE_PROMPT_TEMPLATE_PATH") {
            self.prompt.template_path = v;
        }
        if let Some(v) = lookup("DEFAULT_LLM_MODE") {
            self.llm.mode = v.parse()?;
        }

        // Backend endpoints and models, under the names the .env files use.
        if let Some(v) = lookup("MODELSCOPE_BASE_URL") {
            self.llm.hosted.base_url = v;
        }
        if let Some(v) = lookup("MODELSCOPE_DEFAULT_MODEL") {
            self.llm.hosted.primary_model = v;
        }
        if let Some(v) = lookup("VLLM_BASE_URL") {
            self.llm.local.base_url = v;
        }
        if let Some(v) = lookup("VLLM_MODEL_NAME") {
            self.llm.local.model = v;
        }
        if let Some(v) = lookup("VLLM_MAX_TOKENS") {
            self.llm.local.max_tokens = parse_number("VLLM_MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("VLLM_TEMPERATURE") {
            self.llm.local.temperature = parse_number("VLLM_TEMPERATURE", &v)?;
        }
        Ok(())
    }

    /// Reject settings that would make every run fail or silently misbehave.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        if d.enable_length && d.min_length > d.max_length {
            return Err(OutlinerError::config(format!(
                "detection.min_length ({}) must not exceed detection.max_length ({})",
                d.min_length, d.max_length
            )));
        }
        if d.enable_marker && d.marker.is_empty() {
            return Err(OutlinerError::config(
                "detection.marker must not be empty when the marker rule is enabled",
            ));
        }
        if self.batching.max_chars_per_batch == 0 {
            return Err(OutlinerError::config(
                "batching.max_chars_per_batch must be at least 1",
            ));
        }
        if self.markdown.max_preview_length == 0 {
            return Err(OutlinerError::config(
                "markdown.max_preview_length must be at least 1",
            ));
        }
        if self.llm.mode == LlmMode::Hosted && self.llm.hosted.primary_model.trim().is_empty() {
            return Err(OutlinerError::config(
                "llm.hosted.primary_model must be set in hosted mode",
            ));
        }
        if self.llm.mode == LlmMode::Local && self.llm.local.model.trim().is_empty() {
            return Err(OutlinerError::config("llm.local.model must be set in local mode"));
        }
        Ok(())
    }

    /// Read the hosted API key from the configured env var.
    pub fn hosted_api_key(&self) -> Result<String> {
        let var_name = &self.llm.hosted.api_key_env;
        match std::env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => Ok(val),
            _ => Err(OutlinerError::config(format!(
                "hosted LLM API key not found. Set the {var_name} environment variable."
            ))),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| OutlinerError::config(format!("{key}={value:?} is not a valid number: {e}")))
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.outliner/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| OutlinerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.outliner/outliner.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OutlinerError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        OutlinerError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| OutlinerError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| OutlinerError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| OutlinerError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
