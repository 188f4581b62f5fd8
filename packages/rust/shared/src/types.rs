//! Core domain types for outline extraction.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Lines and heading signals
// ---------------------------------------------------------------------------

/// One independently computed indicator that a line might be a heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingSignal {
    /// `cleaned_text` starts with an outline-style numbering or keyword.
    PatternOutline,
    /// `raw_text` starts with the configured marker character (e.g. `#`).
    MarkerPrefix,
    /// `cleaned_text` length falls inside the configured range.
    LengthRange,
}

/// A single non-skipped source line of an OCR page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    /// 0-based index in the page text, counted before any lines were skipped.
    pub original_line_number: usize,
    /// The line exactly as it appeared in the page text.
    pub raw_text: String,
    /// Trimmed text with configured prefixes removed.
    pub cleaned_text: String,
    /// True when at least one heading signal fired.
    #[serde(default)]
    pub is_heading: bool,
    /// Signals produced by the last detection pass, in rule order.
    #[serde(default)]
    pub heading_signals: Vec<HeadingSignal>,
}

impl LineRecord {
    /// Create an undetected line record.
    pub fn new(
        original_line_number: usize,
        raw_text: impl Into<String>,
        cleaned_text: impl Into<String>,
    ) -> Self {
        Self {
            original_line_number,
            raw_text: raw_text.into(),
            cleaned_text: cleaned_text.into(),
            is_heading: false,
            heading_signals: Vec::new(),
        }
    }
}

/// Heading candidates of one page, tagged with the page's original position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeadings {
    /// 1-based index of the page in the OCR document.
    pub page_number: usize,
    /// Heading-flagged lines, in page order.
    pub headings: Vec<LineRecord>,
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// The rendered, char-counted unit of heading candidates for one page.
///
/// Blocks are the atomic items the batcher groups; they are never split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineBlock {
    /// 1-based page number.
    pub page_number: usize,
    /// Candidate heading lines for the page.
    pub headings: Vec<LineRecord>,
    /// Markdown view sent to the LLM.
    pub markdown: String,
    /// Length of `markdown` in characters.
    pub char_count: usize,
}

impl OutlineBlock {
    /// Build a block, deriving `char_count` from the rendered view.
    pub fn new(page_number: usize, headings: Vec<LineRecord>, markdown: String) -> Self {
        let char_count = markdown.chars().count();
        Self {
            page_number,
            headings,
            markdown,
            char_count,
        }
    }
}

/// Serializable view of a heading line inside a logged batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingSnapshot {
    pub original_line_number: usize,
    pub raw_text: String,
    pub cleaned_text: String,
}

/// Serializable view of a block as it was sent to the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub page_number: usize,
    pub headings: Vec<HeadingSnapshot>,
    pub markdown: String,
    pub char_count: usize,
}

impl From<&OutlineBlock> for BlockSnapshot {
    fn from(block: &OutlineBlock) -> Self {
        Self {
            page_number: block.page_number,
            headings: block
                .headings
                .iter()
                .map(|h| HeadingSnapshot {
                    original_line_number: h.original_line_number,
                    raw_text: h.raw_text.clone(),
                    cleaned_text: h.cleaned_text.clone(),
                })
                .collect(),
            markdown: block.markdown.clone(),
            char_count: block.char_count,
        }
    }
}

// ---------------------------------------------------------------------------
// LLM responses
// ---------------------------------------------------------------------------

/// Which configured model produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// The hosted client's primary model.
    Primary,
    /// One of the hosted client's backup models.
    Backup,
    /// A local inference server.
    Local,
}

/// Result of one successful LLM invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub prompt: String,
    /// Reasoning text, empty when the model produced none.
    #[serde(default)]
    pub thinking: String,
    pub answer: String,
    pub used_model: String,
    pub model_type: ModelType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_char_count_uses_chars_not_bytes() {
        let block = OutlineBlock::new(1, vec![], "第1页候选内容".into());
        assert_eq!(block.char_count, 7);
        assert!(block.markdown.len() > block.char_count);
    }

    #[test]
    fn heading_signal_serializes_snake_case() {
        let json = serde_json::to_string(&HeadingSignal::PatternOutline).unwrap();
        assert_eq!(json, r#""pattern_outline""#);
    }

    #[test]
    fn snapshot_drops_detection_fields() {
        let mut line = LineRecord::new(4, "# 1. Intro", "1. Intro");
        line.is_heading = true;
        line.heading_signals = vec![HeadingSignal::PatternOutline];
        let block = OutlineBlock::new(2, vec![line], "view".into());

        let json = serde_json::to_value(BlockSnapshot::from(&block)).unwrap();
        assert_eq!(json["page_number"], 2);
        assert_eq!(json["headings"][0]["original_line_number"], 4);
        assert!(json["headings"][0].get("is_heading").is_none());
        assert_eq!(json["char_count"], 4);
    }

    #[test]
    fn llm_response_roundtrip() {
        let resp = LlmResponse {
            prompt: "p".into(),
            thinking: String::new(),
            answer: "1. A".into(),
            used_model: "m".into(),
            model_type: ModelType::Backup,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""model_type":"backup""#));
        let parsed: LlmResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, resp);
    }
}
