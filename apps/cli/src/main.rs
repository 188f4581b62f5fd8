//! Outliner CLI: resumable outline extraction from OCR JSON documents.
//!
//! Detects heading candidates in OCR pages and asks an LLM to turn them into
//! a numbered outline, logging every call so interrupted runs can resume.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
