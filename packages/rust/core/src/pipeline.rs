//! Outline extraction pipeline: headings → blocks → batches → LLM → outline.

use std::path::Path;
use std::time::Instant;

use outliner_llm::LlmClient;
use outliner_markdown::format_page_markdown;
use outliner_shared::{AppConfig, BlockSnapshot, OutlineBlock, PageHeadings, Result};
use tracing::{debug, info, instrument};

use crate::batching::batch_by_char_limit;
use crate::calls::{CallContext, invoke_logged};
use crate::document::{build_document_lines, extract_page_headings, load_ocr_document, mark_page_headings};
use crate::parser::extract_outline_lines;
use crate::prompt::PromptTemplate;
use crate::run::RunContext;

/// Progress callback for batch-level status.
pub trait OutlineProgress: Send + Sync {
    /// Called once the file has been split into batches.
    fn batches_planned(&self, total: usize);
    /// Called after each batch's answer has been parsed.
    fn batch_done(&self, index: usize, total: usize, extracted: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl OutlineProgress for SilentProgress {
    fn batches_planned(&self, _total: usize) {}
    fn batch_done(&self, _index: usize, _total: usize, _extracted: usize) {}
}

/// Render one block per heading page, in page order.
pub fn build_blocks(pages: &[PageHeadings], max_preview_length: usize) -> Vec<OutlineBlock> {
    pages
        .iter()
        .filter(|page| !page.headings.is_empty())
        .map(|page| {
            let markdown = format_page_markdown(page.page_number, &page.headings, max_preview_length);
            OutlineBlock::new(page.page_number, page.headings.clone(), markdown)
        })
        .collect()
}

/// Run the LLM over every batch of heading candidates and return the merged
/// outline.
///
/// Batches are processed strictly in order; each prompt carries the outline
/// lines extracted so far. The first failed call aborts the file, after
/// that call has been logged.
#[instrument(skip_all, fields(run_id = %run.run_id, file_key = file_key.unwrap_or("-")))]
pub async fn run_outline_pipeline<C: LlmClient>(
    pages: &[PageHeadings],
    template: &PromptTemplate,
    config: &AppConfig,
    client: &C,
    run: &RunContext,
    file_key: Option<&str>,
    progress: &dyn OutlineProgress,
) -> Result<Vec<String>> {
    let start = Instant::now();

    let blocks = build_blocks(pages, config.markdown.max_preview_length);
    let batches = batch_by_char_limit(blocks, config.batching.max_chars_per_batch);
    let total = batches.len();
    progress.batches_planned(total);
    info!(pages = pages.len(), batches = total, "starting outline extraction");

    let mut history: Vec<String> = Vec::new();
    let mut parts: Vec<Vec<String>> = Vec::with_capacity(total);

    for (idx, batch) in batches.iter().enumerate() {
        let batch_markdown = batch
            .iter()
            .map(|block| block.markdown.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let history_context = history.join("\n");
        let prompt = template.render(&history_context, &batch_markdown);

        debug!(
            batch = idx + 1,
            total,
            blocks = batch.len(),
            chars = batch.iter().map(|b| b.char_count).sum::<usize>(),
            "sending batch"
        );

        let ctx = CallContext {
            batch: batch.iter().map(BlockSnapshot::from).collect(),
            history_context: &history_context,
            current_batch_content: &batch_markdown,
            file_key,
        };
        let response = invoke_logged(client, &run.logger, &prompt, ctx).await?;

        let extracted = extract_outline_lines(&response.answer);
        history.extend(extracted.iter().filter(|l| !l.trim().is_empty()).cloned());
        progress.batch_done(idx + 1, total, extracted.len());
        parts.push(extracted);
    }

    let outline: Vec<String> = parts.into_iter().flatten().collect();
    info!(
        lines = outline.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "outline extraction complete"
    );
    Ok(outline)
}

/// Load one OCR JSON file and extract its outline.
///
/// A document with no heading candidates makes no LLM call and yields an
/// empty outline.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn extract_file_outline<C: LlmClient>(
    path: &Path,
    config: &AppConfig,
    template: &PromptTemplate,
    client: &C,
    run: &RunContext,
    file_key: Option<&str>,
    progress: &dyn OutlineProgress,
) -> Result<Vec<String>> {
    let ocr_pages = load_ocr_document(path)?;
    let mut pages = build_document_lines(
        &ocr_pages,
        config.document.skip_empty_lines,
        &config.document.prefixes_to_remove,
    )?;
    mark_page_headings(&mut pages, &config.detection);
    let headings = extract_page_headings(pages);

    if headings.is_empty() {
        info!("no heading candidates found");
        progress.batches_planned(0);
        return Ok(Vec::new());
    }

    run_outline_pipeline(&headings, template, config, client, run, file_key, progress).await
}

#[cfg(test)]
mod tests {
    use outliner_shared::{LineRecord, OutlinerError};

    use super::*;
    use crate::testing::ScriptedClient;

    const MODEL: &str = "test/model";

    fn template() -> PromptTemplate {
        PromptTemplate::parse("H[{history_outline}] C[{candidate_content}]").unwrap()
    }

    fn page(page_number: usize, lines: &[&str]) -> PageHeadings {
        PageHeadings {
            page_number,
            headings: lines
                .iter()
                .enumerate()
                .map(|(i, text)| {
                    let mut line = LineRecord::new(i, *text, *text);
                    line.is_heading = true;
                    line
                })
                .collect(),
        }
    }

    /// Every block gets its own batch.
    fn one_block_per_batch() -> AppConfig {
        let mut config = AppConfig::default();
        config.batching.max_chars_per_batch = 10;
        config
    }

    fn log_lines(run: &RunContext) -> Vec<serde_json::Value> {
        std::fs::read_to_string(run.logger.log_path(MODEL))
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn blocks_follow_page_order() {
        let pages = vec![page(2, &["1. A"]), page(5, &["2. B"])];
        let blocks = build_blocks(&pages, 500);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].page_number, 5);
        assert!(blocks[1].markdown.starts_with("Page 5 candidates:"));
        assert_eq!(blocks[0].char_count, blocks[0].markdown.chars().count());
    }

    #[tokio::test]
    async fn history_flows_into_later_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunContext::new(dir.path(), "run").unwrap();
        let client = ScriptedClient::new(
            MODEL,
            vec![Ok("1. Intro\nnot an outline line\n\n1.1 Scope"), Ok("2. Body")],
        );
        let pages = vec![page(1, &["1. Intro", "1.1 Scope"]), page(3, &["2. Body"])];

        let outline = run_outline_pipeline(
            &pages,
            &template(),
            &one_block_per_batch(),
            &client,
            &run,
            Some("key-1"),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(outline, vec!["1. Intro", "", "1.1 Scope", "2. Body"]);

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].starts_with("H[] C[Page 1 candidates:"));
        assert!(prompts[1].starts_with("H[1. Intro\n1.1 Scope] C[Page 3 candidates:"));

        let records = log_lines(&run);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r["success"] == true && r["file_key"] == "key-1"));
        assert_eq!(records[1]["history_context"], "1. Intro\n1.1 Scope");
        assert_eq!(records[1]["batch"][0]["page_number"], 3);
    }

    #[tokio::test]
    async fn blocks_share_a_batch_when_they_fit() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunContext::new(dir.path(), "run").unwrap();
        let client = ScriptedClient::new(MODEL, vec![Ok("1. A\n2. B")]);
        let pages = vec![page(1, &["1. A"]), page(2, &["2. B"])];

        let outline = run_outline_pipeline(
            &pages,
            &template(),
            &AppConfig::default(),
            &client,
            &run,
            None,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(outline, vec!["1. A", "2. B"]);
        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("|\n\nPage 2 candidates:"));
    }

    #[tokio::test]
    async fn failure_aborts_after_logging() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunContext::new(dir.path(), "run").unwrap();
        let client = ScriptedClient::new(MODEL, vec![Ok("1. A"), Err("all models failed")]);
        let pages = vec![page(1, &["1. A"]), page(2, &["2. B"]), page(3, &["3. C"])];

        let err = run_outline_pipeline(
            &pages,
            &template(),
            &one_block_per_batch(),
            &client,
            &run,
            Some("key-2"),
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OutlinerError::Llm(_)));
        assert_eq!(client.prompts().len(), 2);

        let records = log_lines(&run);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["success"], false);

        // The first batch succeeded, so the file key already counts as processed.
        let stats = run.logger.stats().unwrap();
        assert!(stats.is_processed("key-2"));
    }

    #[tokio::test]
    async fn no_pages_means_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunContext::new(dir.path(), "run").unwrap();
        let client = ScriptedClient::new(MODEL, vec![]);

        let outline = run_outline_pipeline(
            &[],
            &template(),
            &AppConfig::default(),
            &client,
            &run,
            None,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert!(outline.is_empty());
        assert!(client.prompts().is_empty());
    }

    #[tokio::test]
    async fn extracts_outline_from_ocr_file() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunContext::new(&dir.path().join("logs"), "run").unwrap();
        let file = dir.path().join("doc.json");
        std::fs::write(
            &file,
            serde_json::json!({
                "pages": [
                    [{"page_content": "# 1. Introduction\nThis paragraph is long enough to be ignored by length.\n"}],
                    [{"type": "figure"}, {"page_content": "Plain body text that is not a heading at all."}],
                    [{"page_content": "2. Methods"}]
                ]
            })
            .to_string(),
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.detection.enable_length = false;
        let client = ScriptedClient::new(MODEL, vec![Ok("1. Introduction\n2. Methods")]);

        let outline = extract_file_outline(&file, &config, &template(), &client, &run, Some("doc"), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(outline, vec!["1. Introduction", "2. Methods"]);

        let prompt = &client.prompts()[0];
        assert!(prompt.contains("Page 1 candidates:"));
        assert!(prompt.contains("Page 3 candidates:"));
        assert!(!prompt.contains("Page 2 candidates:"));
        assert!(prompt.contains("| 1 | 1 | 1. Introduction |"));
    }

    #[tokio::test]
    async fn file_without_candidates_skips_llm() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunContext::new(dir.path(), "run").unwrap();
        let file = dir.path().join("doc.json");
        std::fs::write(&file, r#"{"pages": [[{"page_content": "just some long prose without structure"}]]}"#).unwrap();

        let mut config = AppConfig::default();
        config.detection.enable_length = false;
        let client = ScriptedClient::new(MODEL, vec![]);

        let outline = extract_file_outline(&file, &config, &template(), &client, &run, None, &SilentProgress)
            .await
            .unwrap();
        assert!(outline.is_empty());
        assert!(client.prompts().is_empty());
    }
}
