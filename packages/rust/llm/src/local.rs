//! Local inference server backend (vLLM or any OpenAI-compatible server).

use std::sync::LazyLock;

use outliner_shared::{AppConfig, LlmResponse, LocalLlmConfig, ModelType, OutlinerError, Result};
use regex::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::LlmClient;
use crate::wire::{ChatMessage, ChatRequest, chat_completions_url, http_client, post_chat};

/// Key sent when the configured env var is unset; local servers usually ignore it.
const PLACEHOLDER_API_KEY: &str = "EMPTY";

/// `<think>...</think>` followed by the answer up to the end.
static THINK_THEN_ANSWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>(.*)$").expect("valid regex"));

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("valid regex"));

static ANSWER_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<answer>(.*?)</answer>").expect("valid regex"));

/// Split a raw completion into `(thinking, answer)`.
///
/// Without a `<think>` tag, or when the tags cannot be matched, the whole
/// trimmed content is the answer.
pub fn split_thinking(content: &str) -> (String, String) {
    if !content.contains("<think>") {
        return (String::new(), content.trim().to_string());
    }

    if let Some(caps) = THINK_THEN_ANSWER.captures(content) {
        return (caps[1].trim().to_string(), caps[2].trim().to_string());
    }

    match (THINK_BLOCK.captures(content), ANSWER_BLOCK.captures(content)) {
        (Some(think), Some(answer)) => (think[1].trim().to_string(), answer[1].trim().to_string()),
        _ => (String::new(), content.trim().to_string()),
    }
}

pub struct LocalClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl LocalClient {
    pub fn new(config: &LocalLlmConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            endpoint: chat_completions_url(&config.base_url)?,
            api_key: api_key.into(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let local = &config.llm.local;
        let api_key = std::env::var(&local.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| PLACEHOLDER_API_KEY.to_string());
        Self::new(local, api_key)
    }
}

impl LlmClient for LocalClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, prompt: &str) -> Result<LlmResponse> {
        debug!(model = %self.model, endpoint = %self.endpoint, "calling local model");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::user_text(prompt)],
            stream: false,
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            enable_thinking: None,
        };

        let message = post_chat(&self.http, &self.endpoint, &self.api_key, &request)
            .await
            .map_err(|e| OutlinerError::Llm(format!("local model call failed: {e}")))?;

        let (thinking, answer) = split_thinking(message.content.as_deref().unwrap_or_default());

        Ok(LlmResponse {
            prompt: prompt.to_string(),
            thinking,
            answer,
            used_model: self.model.clone(),
            model_type: ModelType::Local,
        })
    }
}
