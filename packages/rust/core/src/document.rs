//! OCR document loading and per-page line records.

use std::path::Path;

use outliner_shared::{DetectionConfig, LineRecord, OutlinerError, PageHeadings, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::detection::detect;

/// One OCR page: a list of layout items, exactly one of which carries the
/// page text under `page_content`.
pub type OcrPage = Vec<Map<String, Value>>;

#[derive(Debug, Deserialize)]
struct OcrDocument {
    #[serde(default)]
    pages: Option<Vec<OcrPage>>,
}

/// Read an OCR JSON file of the form `{"pages": [[{"page_content": ...}], ...]}`.
///
/// A document without `pages` has nothing to extract: it is reported and
/// treated as empty.
pub fn load_ocr_document(path: &Path) -> Result<Vec<OcrPage>> {
    let raw = std::fs::read_to_string(path).map_err(|e| OutlinerError::io(path, e))?;
    let doc: OcrDocument = serde_json::from_str(&raw)
        .map_err(|e| OutlinerError::parse(format!("{}: {e}", path.display())))?;

    match doc.pages {
        Some(pages) => {
            debug!(path = %path.display(), pages = pages.len(), "loaded OCR document");
            Ok(pages)
        }
        None => {
            warn!(path = %path.display(), "OCR document has no 'pages' field");
            Ok(Vec::new())
        }
    }
}

fn page_text(page: &[Map<String, Value>]) -> std::result::Result<&str, String> {
    let contents: Vec<&Value> = page.iter().filter_map(|item| item.get("page_content")).collect();
    match contents.as_slice() {
        [Value::String(text)] => Ok(text.as_str()),
        [_] => Err("page_content must be a string".into()),
        other => Err(format!(
            "expected exactly one page_content, found {}",
            other.len()
        )),
    }
}

/// The text of one OCR page.
pub fn extract_page_text(page: &[Map<String, Value>]) -> Result<&str> {
    page_text(page).map_err(OutlinerError::validation)
}

/// Split on every line terminator (`\n`, `\r\n`, `\r`, vertical tab, form
/// feed, file/group/record separators, NEL, U+2028, U+2029).
///
/// A terminator at the very end does not produce a trailing empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..idx]);
        start = idx + c.len_utf8();
        if c == '\r' {
            if let Some(&(next, '\n')) = chars.peek() {
                chars.next();
                start = next + 1;
            }
        }
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}' | '\u{2028}'
            | '\u{2029}'
    )
}

/// Repeatedly remove any of `prefixes` from the front of `text`, then trim
/// leading whitespace. Empty prefixes are ignored.
pub fn strip_prefixes<'a>(text: &'a str, prefixes: &[String]) -> &'a str {
    let mut rest = text;
    'outer: loop {
        for prefix in prefixes.iter().filter(|p| !p.is_empty()) {
            if let Some(stripped) = rest.strip_prefix(prefix.as_str()) {
                rest = stripped;
                continue 'outer;
            }
        }
        break;
    }
    rest.trim_start()
}

/// Build line records for one page of text.
///
/// Line numbers are 0-based positions in the page and stay stable when
/// blank lines are skipped.
pub fn build_lines(page_text: &str, skip_empty: bool, prefixes_to_remove: &[String]) -> Vec<LineRecord> {
    split_lines(page_text)
        .into_iter()
        .enumerate()
        .filter(|(_, raw)| !(skip_empty && raw.trim().is_empty()))
        .map(|(idx, raw)| {
            let cleaned = strip_prefixes(raw.trim(), prefixes_to_remove);
            LineRecord::new(idx, raw, cleaned)
        })
        .collect()
}

/// Line records for every OCR page, one entry per page even when empty.
pub fn build_document_lines(
    ocr_pages: &[OcrPage],
    skip_empty: bool,
    prefixes_to_remove: &[String],
) -> Result<Vec<Vec<LineRecord>>> {
    ocr_pages
        .iter()
        .enumerate()
        .map(|(idx, page)| {
            let text = page_text(page)
                .map_err(|msg| OutlinerError::validation(format!("OCR page {}: {msg}", idx + 1)))?;
            Ok(build_lines(text, skip_empty, prefixes_to_remove))
        })
        .collect()
}

/// Run heading detection over every line of every page.
pub fn mark_page_headings(pages: &mut [Vec<LineRecord>], config: &DetectionConfig) {
    for line in pages.iter_mut().flatten() {
        detect(line, config);
    }
}

/// Keep pages with at least one heading, tagged with their original 1-based
/// page number.
pub fn extract_page_headings(pages: Vec<Vec<LineRecord>>) -> Vec<PageHeadings> {
    pages
        .into_iter()
        .enumerate()
        .filter_map(|(idx, lines)| {
            let headings: Vec<LineRecord> = lines.into_iter().filter(|l| l.is_heading).collect();
            (!headings.is_empty()).then(|| PageHeadings {
                page_number: idx + 1,
                headings,
            })
        })
        .collect()
}
