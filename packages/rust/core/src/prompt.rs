//! Prompt template loading and rendering.

use std::path::Path;
use std::sync::LazyLock;

use outliner_shared::{OutlinerError, Result};
use regex::{Captures, Regex};

pub const HISTORY_PLACEHOLDER: &str = "{history_outline}";
pub const CANDIDATES_PLACEHOLDER: &str = "{candidate_content}";

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(history_outline|candidate_content)\}").expect("valid regex")
});

/// A validated prompt template containing both placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Validate template text. Both placeholders must be present.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        for placeholder in [HISTORY_PLACEHOLDER, CANDIDATES_PLACEHOLDER] {
            if !text.contains(placeholder) {
                return Err(OutlinerError::config(format!(
                    "prompt template is missing the {placeholder} placeholder"
                )));
            }
        }
        Ok(Self { text })
    }

    /// Read and validate a template file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| OutlinerError::io(path, e))?;
        Self::parse(text)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Substitute both placeholders in one pass.
    ///
    /// Placeholder-looking text inside the substituted values is left as is.
    pub fn render(&self, history_outline: &str, candidate_content: &str) -> String {
        PLACEHOLDER_RE
            .replace_all(&self.text, |caps: &Captures<'_>| match &caps[1] {
                "history_outline" => history_outline.to_string(),
                _ => candidate_content.to_string(),
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_placeholders() {
        let err = PromptTemplate::parse("only {history_outline}").unwrap_err();
        assert!(err.to_string().contains("{candidate_content}"));
        assert!(PromptTemplate::parse("only {candidate_content}").is_err());
        assert!(matches!(
            PromptTemplate::parse(""),
            Err(OutlinerError::Config { .. })
        ));
    }

    #[test]
    fn renders_both_placeholders() {
        let tpl = PromptTemplate::parse("H:\n{history_outline}\nC:\n{candidate_content}\n{json: 1}").unwrap();
        assert_eq!(tpl.render("1. A", "| 1 | 1 | x |"), "H:\n1. A\nC:\n| 1 | 1 | x |\n{json: 1}");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let tpl = PromptTemplate::parse("{history_outline}|{candidate_content}").unwrap();
        assert_eq!(
            tpl.render("{candidate_content}", "{history_outline}"),
            "{candidate_content}|{history_outline}"
        );
    }

    #[test]
    fn placeholders_may_repeat() {
        let tpl = PromptTemplate::parse("{history_outline}{history_outline}{candidate_content}").unwrap();
        assert_eq!(tpl.render("a", "b"), "aab");
    }

    #[test]
    fn shipped_template_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../prompts/outline_prompt.txt");
        let tpl = PromptTemplate::load(&path).unwrap();
        assert!(tpl.as_str().contains(HISTORY_PLACEHOLDER));
    }
}
