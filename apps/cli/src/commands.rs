//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use outliner_core::inputs::{file_key, find_input_files, select_range};
use outliner_core::pipeline::{OutlineProgress, extract_file_outline};
use outliner_core::prompt::PromptTemplate;
use outliner_core::run::{RunContext, run_id_from_path, timestamped_run_id};
use outliner_llm::AnyClient;
use outliner_shared::{AppConfig, LlmMode, init_config, load_config, load_config_from, split_list};
use outliner_storage::{LogStats, scan_log_dir};
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Outliner: extract document outlines from OCR output with an LLM.
#[derive(Parser)]
#[command(
    name = "outliner",
    version,
    about = "Extract numbered outlines from OCR JSON documents using an LLM.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.outliner/outliner.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract outlines from an OCR JSON file or a directory of them.
    Extract(ExtractArgs),

    /// Show statistics of the LLM call logs.
    Stats {
        /// Call log root (defaults to logging.log_dir from config).
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

#[derive(Args, Debug)]
pub(crate) struct ExtractArgs {
    /// OCR JSON file or directory (searched recursively).
    #[arg(long, default_value = "sample_data/ocr_results")]
    pub input: PathBuf,

    /// Run id naming the log files (defaults to one derived from --input).
    #[arg(long)]
    pub run_id: Option<String>,

    /// Start a fresh log file named after --input and the current time.
    #[arg(long, conflicts_with = "run_id")]
    pub timestamped_run_id: bool,

    /// Reprocess files that already have a successful call logged.
    #[arg(long)]
    pub force: bool,

    /// Call log root (defaults to logging.log_dir from config).
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// First file index to process (0-based, inclusive).
    #[arg(long, allow_negative_numbers = true)]
    pub start: Option<i64>,

    /// File index to stop at (exclusive).
    #[arg(long, allow_negative_numbers = true)]
    pub end: Option<i64>,

    /// LLM backend: hosted or local.
    #[arg(long)]
    pub llm_mode: Option<LlmMode>,

    /// Disable the outline-numbering pattern rule.
    #[arg(long)]
    pub disable_pattern: bool,

    /// Disable the marker-prefix rule.
    #[arg(long)]
    pub disable_marker: bool,

    /// Disable the length-window rule.
    #[arg(long)]
    pub disable_length: bool,

    /// Minimum heading length in characters.
    #[arg(long)]
    pub min_length: Option<usize>,

    /// Maximum heading length in characters.
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Keep whitespace-only lines.
    #[arg(long)]
    pub no_skip_empty: bool,

    /// Comma-separated prefixes stripped from line starts.
    #[arg(long)]
    pub prefixes_to_remove: Option<String>,

    /// Preview length of each candidate line in characters.
    #[arg(long)]
    pub max_preview_length: Option<usize>,

    /// Character budget of one LLM batch.
    #[arg(long)]
    pub max_chars_per_batch: Option<usize>,

    /// Prompt template file.
    #[arg(long)]
    pub prompt_template: Option<String>,

    /// Also write `<stem>.outline.txt` for every processed file here.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

impl ExtractArgs {
    /// Layer command-line flags over the loaded configuration.
    /// Explicit `--run-id`, else a timestamped id, else one stable per input.
    fn resolve_run_id(&self) -> String {
        match &self.run_id {
            Some(id) => id.clone(),
            None if self.timestamped_run_id => timestamped_run_id(&self.input),
            None => run_id_from_path(&self.input),
        }
    }

    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(mode) = self.llm_mode {
            config.llm.mode = mode;
        }
        if self.disable_pattern {
            config.detection.enable_pattern = false;
        }
        if self.disable_marker {
            config.detection.enable_marker = false;
        }
        if self.disable_length {
            config.detection.enable_length = false;
        }
        if let Some(n) = self.min_length {
            config.detection.min_length = n;
        }
        if let Some(n) = self.max_length {
            config.detection.max_length = n;
        }
        if self.no_skip_empty {
            config.document.skip_empty_lines = false;
        }
        if let Some(prefixes) = &self.prefixes_to_remove {
            config.document.prefixes_to_remove = split_list(prefixes);
        }
        if let Some(n) = self.max_preview_length {
            config.markdown.max_preview_length = n;
        }
        if let Some(n) = self.max_chars_per_batch {
            config.batching.max_chars_per_batch = n;
        }
        if let Some(path) = &self.prompt_template {
            config.prompt.template_path = path.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.logging.log_dir = dir.to_string_lossy().into_owned();
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "outliner=info",
        1 => "outliner=debug",
        _ => "outliner=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Extract(args) => cmd_extract(config_path, &args).await,
        Command::Stats { log_dir } => cmd_stats(config_path, log_dir.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Config file (or defaults) with environment overrides applied.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    config.apply_env_overrides()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// extract
// ---------------------------------------------------------------------------

async fn cmd_extract(config_path: Option<&Path>, args: &ExtractArgs) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    args.apply_to(&mut config);
    config.validate()?;

    let run_id = args.resolve_run_id();
    let log_dir = PathBuf::from(&config.logging.log_dir);
    let run = RunContext::new(&log_dir, run_id)?;

    info!(
        run_id = %run.run_id,
        log_dir = %log_dir.display(),
        input = %args.input.display(),
        llm_mode = %config.llm.mode,
        "starting extraction"
    );
    info!(
        pattern = config.detection.enable_pattern,
        marker = config.detection.enable_marker,
        length = config.detection.enable_length,
        min_length = config.detection.min_length,
        max_length = config.detection.max_length,
        skip_empty = config.document.skip_empty_lines,
        prefixes = ?config.document.prefixes_to_remove,
        max_preview_length = config.markdown.max_preview_length,
        max_chars_per_batch = config.batching.max_chars_per_batch,
        template = %config.prompt.template_path,
        "extraction settings"
    );

    let stats = run.logger.stats()?;
    if !args.force && stats.total_calls > 0 {
        print_resume_summary(&stats);
    }

    let files = find_input_files(&args.input)?;
    let total_found = files.len();
    let files = select_range(files, args.start, args.end)?;
    info!(selected = files.len(), found = total_found, "input files");

    let template = PromptTemplate::load(Path::new(&config.prompt.template_path))?;
    let client = AnyClient::from_config(&config)?;

    let (pending, skipped) = partition_pending(&files, &stats, args.force);

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for (path, key) in &skipped {
        bar.println(format!(
            "skipped {} (already processed, key {}...; use --force to redo)",
            path.display(),
            &key[..8]
        ));
        bar.inc(1);
    }

    let mut succeeded = 0usize;
    let mut total_lines = 0usize;
    let mut failed: Vec<PathBuf> = Vec::new();

    for (path, key) in &pending {
        let name = path.display().to_string();

        let progress = CliProgress {
            bar: &bar,
            name: &name,
        };
        bar.set_message(name.clone());

        match extract_file_outline(path, &config, &template, &client, &run, Some(key), &progress).await {
            Ok(outline) => {
                succeeded += 1;
                total_lines += outline.len();
                bar.println(format!("\n== {name}: {} outline lines", outline.len()));
                for line in &outline {
                    bar.println(line);
                }
                if let Some(dir) = &args.output_dir {
                    match write_outline(dir, path, &outline) {
                        Ok(out) => info!(path = %out.display(), "wrote outline"),
                        Err(e) => warn!(error = %e, "failed to write outline file"),
                    }
                }
            }
            Err(e) => {
                error!(file = %name, error = %e, "failed to process file");
                failed.push(path.clone());
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!();
    println!("  Files:     {}", files.len());
    println!("  Succeeded: {succeeded}");
    if !skipped.is_empty() {
        println!("  Skipped:   {}", skipped.len());
    }
    if !failed.is_empty() {
        println!("  Failed:    {}", failed.len());
        for path in &failed {
            println!("    - {}", path.display());
        }
    }
    println!("  Outline lines: {total_lines}");

    let final_stats = run.logger.stats()?;
    println!();
    print_stats(&final_stats);

    Ok(())
}

/// Files paired with their keys.
type KeyedFiles = Vec<(PathBuf, String)>;

/// Split `files` into those still to process and those whose key already has
/// a successful call logged. With `force` nothing is skipped.
///
/// Keys that only appear in failed calls stay pending.
fn partition_pending(files: &[PathBuf], stats: &LogStats, force: bool) -> (KeyedFiles, KeyedFiles) {
    files
        .iter()
        .map(|path| (path.clone(), file_key(path)))
        .partition(|(_, key)| force || !stats.is_processed(key))
}

/// Write one file's outline as `<stem>.outline.txt` under `dir`.
fn write_outline(dir: &Path, input: &Path, outline: &[String]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| eyre!("input has no file name: {}", input.display()))?;

    let out = dir.join(format!("{stem}.outline.txt"));
    let mut content = outline.join("\n");
    content.push('\n');
    std::fs::write(&out, content)?;
    Ok(out)
}

/// Batch-level status on the file progress bar.
struct CliProgress<'a> {
    bar: &'a ProgressBar,
    name: &'a str,
}

impl OutlineProgress for CliProgress<'_> {
    fn batches_planned(&self, total: usize) {
        self.bar.set_message(format!("{} ({total} batches)", self.name));
    }

    fn batch_done(&self, index: usize, total: usize, _extracted: usize) {
        self.bar.set_message(format!("{} [batch {index}/{total}]", self.name));
    }
}

// ---------------------------------------------------------------------------
// stats / config
// ---------------------------------------------------------------------------

fn print_resume_summary(stats: &LogStats) {
    println!("Resuming from existing call logs:");
    print_stats(stats);
    let failed_only = stats.failed_file_keys().len();
    if failed_only > 0 {
        println!("  {failed_only} file(s) only have failed calls and will be reprocessed");
    }
    println!();
}

fn print_stats(stats: &LogStats) {
    println!("  Log dir:    {}", stats.log_dir.display());
    println!("  Log files:  {}", stats.log_files.len());
    println!("  LLM calls:  {}", stats.total_calls);
    println!("  Succeeded:  {}", stats.successful_calls);
    println!("  Failed:     {}", stats.failed_calls);
    println!("  Processed files: {}", stats.processed_files());
}

fn cmd_stats(config_path: Option<&Path>, log_dir: Option<&Path>) -> Result<()> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from(resolve_config(config_path)?.logging.log_dir),
    };

    let stats = scan_log_dir(&log_dir)?;
    if stats.log_files.is_empty() {
        println!("No call logs under {}", log_dir.display());
        return Ok(());
    }

    print_stats(&stats);
    let failed_only = stats.failed_file_keys();
    if !failed_only.is_empty() {
        println!("  Files with only failed calls: {}", failed_only.len());
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_args(argv: &[&str]) -> ExtractArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Extract(args) => args,
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn flags_override_config() {
        let args = extract_args(&[
            "outliner",
            "extract",
            "--input",
            "docs",
            "--llm-mode",
            "local",
            "--disable-marker",
            "--min-length",
            "5",
            "--no-skip-empty",
            "--prefixes-to-remove",
            "#, >",
            "--max-chars-per-batch",
            "1200",
            "--log-dir",
            "/tmp/logs",
        ]);
        let mut config = AppConfig::default();
        args.apply_to(&mut config);

        assert_eq!(config.llm.mode, LlmMode::Local);
        assert!(!config.detection.enable_marker);
        assert!(config.detection.enable_pattern);
        assert_eq!(config.detection.min_length, 5);
        assert!(!config.document.skip_empty_lines);
        assert_eq!(config.document.prefixes_to_remove, vec!["#", ">"]);
        assert_eq!(config.batching.max_chars_per_batch, 1200);
        assert_eq!(config.logging.log_dir, "/tmp/logs");
    }

    #[test]
    fn defaults_leave_config_alone() {
        let args = extract_args(&["outliner", "extract"]);
        let mut config = AppConfig::default();
        args.apply_to(&mut config);

        assert_eq!(args.input, PathBuf::from("sample_data/ocr_results"));
        assert_eq!(config.detection.min_length, AppConfig::default().detection.min_length);
        assert_eq!(config.llm.mode, LlmMode::Hosted);
    }

    #[test]
    fn run_id_sources() {
        let explicit = extract_args(&["outliner", "extract", "--input", "batch-7", "--run-id", "mine"]);
        assert_eq!(explicit.resolve_run_id(), "mine");

        let stable = extract_args(&["outliner", "extract", "--input", "batch-7"]);
        assert_eq!(stable.resolve_run_id(), run_id_from_path(Path::new("batch-7")));

        let stamped = extract_args(&["outliner", "extract", "--input", "batch-7", "--timestamped-run-id"]);
        let id = stamped.resolve_run_id();
        assert!(id.starts_with("batch_7_20"), "{id}");
        assert_eq!(id.len(), "batch_7_".len() + "YYYY_MM_DD_HH_MM_SS".len());

        let both = Cli::try_parse_from(["outliner", "extract", "--run-id", "x", "--timestamped-run-id"]);
        assert!(both.is_err());
    }

    #[test]
    fn negative_start_parses() {
        let args = extract_args(&["outliner", "extract", "--start", "-3", "--end", "4"]);
        assert_eq!(args.start, Some(-3));
        assert_eq!(args.end, Some(4));
    }

    #[test]
    fn writes_outline_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = write_outline(
            dir.path(),
            Path::new("/data/report.json"),
            &["1. A".to_string(), String::new(), "2. B".to_string()],
        )
        .unwrap();

        assert_eq!(out, dir.path().join("report.outline.txt"));
        assert_eq!(std::fs::read_to_string(out).unwrap(), "1. A\n\n2. B\n");
    }

    #[test]
    fn resume_skips_only_successful_keys() {
        let dir = tempfile::tempdir().unwrap();
        let done = dir.path().join("done.json");
        let failed = dir.path().join("failed.json");
        let fresh = dir.path().join("fresh.json");
        for path in [&done, &failed, &fresh] {
            std::fs::write(path, "{}").unwrap();
        }

        let logs = dir.path().join("logs").join("org_model");
        std::fs::create_dir_all(&logs).unwrap();
        let records = [
            format!(r#"{{"success": false, "file_key": "{}"}}"#, file_key(&done)),
            format!(r#"{{"success": true, "file_key": "{}"}}"#, file_key(&done)),
            format!(r#"{{"success": false, "file_key": "{}"}}"#, file_key(&failed)),
        ];
        std::fs::write(logs.join("run.jsonl"), records.join("\n")).unwrap();
        let stats = scan_log_dir(&dir.path().join("logs")).unwrap();

        let files = vec![done.clone(), failed.clone(), fresh.clone()];
        let (pending, skipped) = partition_pending(&files, &stats, false);
        let pending: Vec<_> = pending.into_iter().map(|(p, _)| p).collect();
        assert_eq!(pending, vec![failed, fresh]);
        assert_eq!(skipped, vec![(done.clone(), file_key(&done))]);

        let (pending, skipped) = partition_pending(&files, &stats, true);
        assert_eq!(pending.len(), 3);
        assert!(skipped.is_empty());
    }
}
