//! Heading candidate detection.
//!
//! Three independent rules vote on each line: an outline-numbering pattern on
//! the cleaned text, a marker prefix on the raw text, and a character-length
//! window on the cleaned text. Any enabled rule that fires adds its signal.

use std::sync::LazyLock;

use outliner_shared::{DetectionConfig, HeadingSignal, LineRecord};
use regex::Regex;

/// Outline-style prefixes, tolerant of OCR whitespace noise between tokens.
///
/// `\s` is Unicode-aware, so full-width spaces count as whitespace. The
/// appendix keywords must be contiguous.
static OUTLINE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    let ws = r"\s*";
    let numeral = "[一二三四五六七八九十]+";
    let arabic = format!(r"\d+{ws}(?:\.{ws}\d+)*");
    let punct = "[、.:：．]";
    // Well-formed roman numerals, never empty: uppercase I..MMMCMXCIX, or
    // lowercase i..xxxix so that words such as "did" or "mix" stay prose.
    let hundreds = "(?:CM|CD|D?C{0,3})";
    let tens = "(?:XC|XL|L?X{0,3})";
    let units = "(?:IX|IV|V?I{0,3})";
    let upper_roman = format!(
        "M{{1,3}}{hundreds}{tens}{units}|(?:CM|CD|D|D?C{{1,3}}){tens}{units}|(?:XC|XL|L|L?X{{1,3}}){units}|IX|IV|V|V?I{{1,3}}"
    );
    let lower_roman = "x{1,3}(?:ix|iv|v?i{0,3})|ix|iv|v|v?i{1,3}";

    let alternatives = [
        // 1 . 2 :   2．3．1.
        format!("{arabic}{ws}{punct}"),
        // 一、   二 .
        format!("{numeral}{ws}{punct}"),
        // ( 1 )   （一）   (A)
        format!(r"[(（]{ws}(?:\d+|{numeral}|[A-Za-z]){ws}[)）]"),
        // 第 1 条   第二章
        format!(r"第{ws}(?:{numeral}|\d+)"),
        // Chapter 3   ARTICLE iv
        format!(r"(?i:chapter|article|part)\s+(?:\d+|(?:{upper_roman}|{lower_roman})\b)"),
        // § 2 . 1
        format!("§{ws}{arabic}"),
        r"附录|附件|附表|附则|(?:Appendix|Annex)\b".to_string(),
    ];

    Regex::new(&format!("^(?:{})", alternatives.join("|"))).expect("valid regex")
});

/// Whether `text` starts like an outline heading (`1.1`, `第三章`, `(a)`, ...).
pub fn matches_outline_pattern(text: &str) -> bool {
    !text.is_empty() && OUTLINE_PREFIX_RE.is_match(text)
}

/// Whether the raw line, ignoring leading whitespace, starts with `marker`.
pub fn has_marker_prefix(raw_text: &str, marker: &str) -> bool {
    !marker.is_empty() && raw_text.trim_start().starts_with(marker)
}

/// Inclusive length check in characters.
pub fn within_length(text: &str, min_length: usize, max_length: usize) -> bool {
    let len = text.chars().count();
    min_length <= len && len <= max_length
}

/// Recompute `heading_signals` and `is_heading` for one line.
///
/// Previous signals are discarded, so calling this twice yields the same
/// result as calling it once.
pub fn detect(line: &mut LineRecord, config: &DetectionConfig) {
    line.heading_signals.clear();

    if config.enable_pattern && matches_outline_pattern(&line.cleaned_text) {
        line.heading_signals.push(HeadingSignal::PatternOutline);
    }
    if config.enable_marker && has_marker_prefix(&line.raw_text, &config.marker) {
        line.heading_signals.push(HeadingSignal::MarkerPrefix);
    }
    if config.enable_length
        && within_length(&line.cleaned_text, config.min_length, config.max_length)
    {
        line.heading_signals.push(HeadingSignal::LengthRange);
    }

    line.is_heading = !line.heading_signals.is_empty();
}
