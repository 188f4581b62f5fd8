//! Core outline extraction logic for Outliner.
//!
//! OCR pages flow through heading detection, per-page Markdown blocks,
//! character-budget batching and sequential LLM calls that carry the outline
//! extracted so far. Every call is logged for resumability.

pub mod batching;
pub mod calls;
pub mod detection;
pub mod document;
pub mod inputs;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod run;

#[cfg(test)]
mod testing;
