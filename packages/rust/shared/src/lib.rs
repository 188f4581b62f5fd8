//! Shared types, error model, and configuration for Outliner.
//!
//! This crate is the foundation depended on by all other Outliner crates.
//! It provides:
//! - [`OutlinerError`]: the unified error type
//! - Domain types ([`LineRecord`], [`HeadingSignal`], [`PageHeadings`], [`OutlineBlock`], [`LlmResponse`])
//! - Configuration ([`AppConfig`], [`DetectionConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchingConfig, DetectionConfig, DocumentConfig, HostedLlmConfig, LlmConfig,
    LlmMode, LocalLlmConfig, LoggingConfig, MarkdownConfig, PromptConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, split_list,
};
pub use error::{OutlinerError, Result};
pub use types::{
    BlockSnapshot, HeadingSignal, HeadingSnapshot, LineRecord, LlmResponse, ModelType,
    OutlineBlock, PageHeadings,
};
