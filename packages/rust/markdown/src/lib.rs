//! Markdown views of heading candidates.
//!
//! Renders one OCR page's candidate lines as a small Markdown table. The
//! output is what the LLM sees, and its character length is the unit the
//! batcher budgets against, so rendering must stay deterministic.

use outliner_shared::LineRecord;
use tracing::trace;

/// Suffix appended to previews that were cut short.
const ELLIPSIS: &str = "...";

/// Render a page's heading candidates as a Markdown table.
///
/// Line numbers are shown 1-based. Each preview holds at most
/// `max_preview_length` characters of the cleaned text, followed by `...`
/// when truncated.
pub fn format_page_markdown(
    page_number: usize,
    headings: &[LineRecord],
    max_preview_length: usize,
) -> String {
    let mut lines = Vec::with_capacity(headings.len() + 3);
    lines.push(format!("Page {page_number} candidates:"));
    lines.push(format!(
        "| Page | Line | Preview (first {max_preview_length} chars) |"
    ));
    lines.push("|------|------|---------------------|".to_string());

    for line in headings {
        let line_no = line.original_line_number + 1;
        let preview = preview(&line.cleaned_text, max_preview_length);
        lines.push(format!("| {page_number} | {line_no} | {preview} |"));
    }

    trace!(page_number, rows = headings.len(), "rendered page table");
    lines.join("\n")
}

/// Truncate `text` to `max_chars` characters, marking the cut with `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", &text[..byte_idx]),
        None => text.to_string(),
    }
}
