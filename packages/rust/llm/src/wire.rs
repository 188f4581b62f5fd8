//! OpenAI-compatible `/chat/completions` wire types and transport.

use std::time::Duration;

use outliner_shared::{OutlinerError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_thinking: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: MessageContent<'a>,
}

impl<'a> ChatMessage<'a> {
    pub fn user_text(prompt: &'a str) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(prompt),
        }
    }

    /// A user message whose text is wrapped as a single content part.
    pub fn user_parts(prompt: &'a str) -> Self {
        Self {
            role: "user",
            content: MessageContent::Parts(vec![ContentPart {
                kind: "text",
                text: prompt,
            }]),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
pub(crate) struct ContentPart<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

/// Build the shared HTTP client.
pub(crate) fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(concat!("Outliner/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| OutlinerError::Network(format!("client build: {e}")))
}

/// Resolve `{base_url}/chat/completions`, tolerating a missing trailing slash.
pub(crate) fn chat_completions_url(base_url: &str) -> Result<Url> {
    let base = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };

    Url::parse(&base)
        .and_then(|u| u.join("chat/completions"))
        .map_err(|e| OutlinerError::config(format!("invalid LLM base URL '{base_url}': {e}")))
}

/// POST one chat request and return the first choice's message.
pub(crate) async fn post_chat(
    client: &Client,
    endpoint: &Url,
    api_key: &str,
    request: &ChatRequest<'_>,
) -> Result<AssistantMessage> {
    let response = client
        .post(endpoint.clone())
        .bearer_auth(api_key.trim())
        .json(request)
        .send()
        .await
        .map_err(|e| OutlinerError::Network(format!("{endpoint}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        let snippet: String = body.chars().take(300).collect();
        return Err(OutlinerError::Llm(format!(
            "{} returned {status}: {snippet}",
            request.model
        )));
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .map_err(|e| OutlinerError::parse(format!("invalid chat response from {}: {e}", request.model)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| OutlinerError::Llm(format!("{} returned no choices", request.model)))
}
