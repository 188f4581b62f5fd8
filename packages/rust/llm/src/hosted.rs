//! Hosted OpenAI-compatible backend with ordered model fallback.

use outliner_shared::{AppConfig, HostedLlmConfig, LlmResponse, ModelType, OutlinerError, Result};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::LlmClient;
use crate::wire::{ChatMessage, ChatRequest, chat_completions_url, http_client, post_chat};

/// What a hosted model accepts beyond a plain text prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelProfile {
    /// Accepts the `enable_thinking` request flag.
    pub supports_thinking: bool,
    /// Expects the prompt wrapped as a `[{"type": "text", ...}]` content list.
    pub wraps_text_prompt: bool,
}

/// Capabilities of known hosted models. Unknown models get plain text and no
/// extra flags.
pub fn profile_for(model: &str) -> ModelProfile {
    match model {
        "Qwen/Qwen3-235B-A22B" => ModelProfile {
            supports_thinking: true,
            wraps_text_prompt: false,
        },
        "moonshotai/Kimi-K2.5" => ModelProfile {
            supports_thinking: false,
            wraps_text_prompt: true,
        },
        _ => ModelProfile::default(),
    }
}

pub struct HostedClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    /// Primary first, then backups; duplicates removed.
    models: Vec<String>,
    enable_thinking: bool,
}

impl HostedClient {
    pub fn new(config: &HostedLlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let mut models: Vec<String> = Vec::with_capacity(config.backup_models.len() + 1);
        for model in std::iter::once(&config.primary_model).chain(&config.backup_models) {
            let model = model.trim();
            if !model.is_empty() && !models.iter().any(|m| m == model) {
                models.push(model.to_string());
            }
        }
        if models.is_empty() {
            return Err(OutlinerError::config("no hosted models configured"));
        }

        Ok(Self {
            http: http_client(config.timeout_secs)?,
            endpoint: chat_completions_url(&config.base_url)?,
            api_key: api_key.into(),
            models,
            enable_thinking: config.enable_thinking,
        })
    }

    /// Build from app config, reading the API key from the environment.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.hosted_api_key()?;
        Self::new(&config.llm.hosted, api_key)
    }

    /// Models in the order they are tried.
    pub fn models(&self) -> &[String] {
        &self.models
    }

    fn request<'a>(&self, model: &'a str, prompt: &'a str) -> ChatRequest<'a> {
        let profile = profile_for(model);
        let message = if profile.wraps_text_prompt {
            ChatMessage::user_parts(prompt)
        } else {
            ChatMessage::user_text(prompt)
        };

        ChatRequest {
            model,
            messages: vec![message],
            stream: false,
            max_tokens: None,
            temperature: None,
            enable_thinking: (profile.supports_thinking && self.enable_thinking).then_some(true),
        }
    }
}

impl LlmClient for HostedClient {
    fn model_name(&self) -> &str {
        &self.models[0]
    }

    async fn invoke(&self, prompt: &str) -> Result<LlmResponse> {
        let mut last_error = None;

        for (idx, model) in self.models.iter().enumerate() {
            debug!(model = %model, attempt = idx + 1, "calling hosted model");
            let request = self.request(model, prompt);

            match post_chat(&self.http, &self.endpoint, &self.api_key, &request).await {
                Ok(message) => {
                    if idx > 0 {
                        info!(model = %model, "backup model answered");
                    }
                    return Ok(LlmResponse {
                        prompt: prompt.to_string(),
                        thinking: message.reasoning_content.unwrap_or_default().trim().to_string(),
                        answer: message.content.unwrap_or_default().trim().to_string(),
                        used_model: model.clone(),
                        model_type: if idx == 0 {
                            ModelType::Primary
                        } else {
                            ModelType::Backup
                        },
                    });
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "hosted model call failed");
                    last_error = Some(e);
                }
            }
        }

        Err(OutlinerError::Llm(format!(
            "all hosted models failed; tried {:?}; last error: {}",
            self.models,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(server: &MockServer, primary: &str, backups: &[&str]) -> HostedLlmConfig {
        HostedLlmConfig {
            base_url: format!("{}/v1", server.uri()),
            primary_model: primary.into(),
            backup_models: backups.iter().map(|s| s.to_string()).collect(),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    fn answer(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    #[test]
    fn profiles() {
        assert!(profile_for("Qwen/Qwen3-235B-A22B").supports_thinking);
        assert!(profile_for("moonshotai/Kimi-K2.5").wraps_text_prompt);
        assert_eq!(profile_for("someone/else"), ModelProfile::default());
    }

    #[test]
    fn model_list_dedups_in_order() {
        let cfg = HostedLlmConfig::default();
        let client = HostedClient::new(&cfg, "key").unwrap();
        assert_eq!(client.models()[0], "ZhipuAI/GLM-4.7-Flash");
        assert_eq!(client.models().len(), 4);
        assert_eq!(client.model_name(), "ZhipuAI/GLM-4.7-Flash");
    }

    #[test]
    fn thinking_flag_only_for_capable_models() {
        let cfg = HostedLlmConfig::default();
        let client = HostedClient::new(&cfg, "key").unwrap();

        let req = serde_json::to_value(client.request("Qwen/Qwen3-235B-A22B", "p")).unwrap();
        assert_eq!(req["enable_thinking"], true);

        let req = serde_json::to_value(client.request("ZhipuAI/GLM-4.7-Flash", "p")).unwrap();
        assert!(req.get("enable_thinking").is_none());
        assert_eq!(req["stream"], false);
    }

    #[tokio::test]
    async fn primary_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({ "model": "m/primary" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": {
                    "content": "  1. Intro\n1.1 Scope  ",
                    "reasoning_content": " thinking hard "
                } }]
            })))
            .mount(&server)
            .await;

        let client = HostedClient::new(&config(&server, "m/primary", &[]), "secret").unwrap();
        let resp = client.invoke("prompt text").await.unwrap();

        assert_eq!(resp.answer, "1. Intro\n1.1 Scope");
        assert_eq!(resp.thinking, "thinking hard");
        assert_eq!(resp.used_model, "m/primary");
        assert_eq!(resp.model_type, ModelType::Primary);
        assert_eq!(resp.prompt, "prompt text");
    }

    #[tokio::test]
    async fn falls_back_to_backup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "model": "m/primary" })))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "model": "m/backup" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("2. Body")))
            .mount(&server)
            .await;

        let client =
            HostedClient::new(&config(&server, "m/primary", &["m/backup"]), "k").unwrap();
        let resp = client.invoke("p").await.unwrap();

        assert_eq!(resp.used_model, "m/backup");
        assert_eq!(resp.model_type, ModelType::Backup);
        assert_eq!(resp.answer, "2. Body");
        assert!(resp.thinking.is_empty());
    }

    #[tokio::test]
    async fn all_models_failing_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let client = HostedClient::new(&config(&server, "a", &["b"]), "k").unwrap();
        let err = client.invoke("p").await.unwrap_err();

        assert!(matches!(err, OutlinerError::Llm(_)));
        assert!(err.to_string().contains("all hosted models failed"));
    }

    #[tokio::test]
    async fn wraps_prompt_for_multimodal_models() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "messages": [{ "role": "user", "content": [{ "type": "text", "text": "p" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("ok")))
            .mount(&server)
            .await;

        let client = HostedClient::new(&config(&server, "moonshotai/Kimi-K2.5", &[]), "k").unwrap();
        assert_eq!(client.invoke("p").await.unwrap().answer, "ok");
    }
}
