//! Parsing of LLM answers into outline lines.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::split_lines;

static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)*").expect("valid regex"));

/// Keep the numbered lines of an answer, plus blank lines as `""`.
///
/// A line is kept verbatim when its trimmed form starts with a hierarchical
/// number such as `2` or `3.1.4`; everything else is dropped.
pub fn extract_outline_lines(text: &str) -> Vec<String> {
    split_lines(text)
        .into_iter()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                Some(String::new())
            } else if NUMBERED_RE.is_match(trimmed) {
                Some(line.to_string())
            } else {
                None
            }
        })
        .collect()
}
