//! LLM clients for outline extraction.
//!
//! The pipeline only sees the [`LlmClient`] capability: send a prompt, get an
//! [`LlmResponse`] back or an error once every configured model has failed.
//! Two OpenAI-compatible backends implement it:
//! - [`HostedClient`]: hosted API with an ordered list of backup models
//! - [`LocalClient`]: single-model local inference server (vLLM style)
//!
//! [`AnyClient`] picks one of them from configuration at construction time.

mod hosted;
mod local;
mod wire;

use std::future::Future;

use outliner_shared::{AppConfig, LlmMode, LlmResponse, Result};
use tracing::info;

pub use hosted::{HostedClient, ModelProfile, profile_for};
pub use local::{LocalClient, split_thinking};

/// Capability the outline pipeline depends on.
pub trait LlmClient: Send + Sync {
    /// Model name used to route log records when a call fails.
    fn model_name(&self) -> &str;

    /// Run one prompt to completion.
    ///
    /// Retries across backup models happen inside the client; an error means
    /// every option was exhausted.
    fn invoke(&self, prompt: &str) -> impl Future<Output = Result<LlmResponse>> + Send;
}

/// A client selected by [`LlmMode`].
pub enum AnyClient {
    Hosted(HostedClient),
    Local(LocalClient),
}

impl AnyClient {
    /// Build the backend named by `config.llm.mode`.
    ///
    /// Fails fast (e.g. on a missing API key) so no file is processed with a
    /// client that cannot work.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = match config.llm.mode {
            LlmMode::Hosted => Self::Hosted(HostedClient::from_config(config)?),
            LlmMode::Local => Self::Local(LocalClient::from_config(config)?),
        };
        info!(mode = %config.llm.mode, model = client.model_name(), "LLM client ready");
        Ok(client)
    }
}

impl LlmClient for AnyClient {
    fn model_name(&self) -> &str {
        match self {
            Self::Hosted(c) => c.model_name(),
            Self::Local(c) => c.model_name(),
        }
    }

    async fn invoke(&self, prompt: &str) -> Result<LlmResponse> {
        match self {
            Self::Hosted(c) => c.invoke(prompt).await,
            Self::Local(c) => c.invoke(prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mode_builds_without_api_key() {
        let mut config = AppConfig::default();
        config.llm.mode = LlmMode::Local;
        config.llm.local.api_key_env = "OUTLINER_TEST_UNSET_LOCAL_KEY_987".into();

        let client = AnyClient::from_config(&config).expect("local client");
        assert!(matches!(client, AnyClient::Local(_)));
        assert_eq!(client.model_name(), "Qwen3-4B-Instruct-2507");
    }

    #[test]
    fn hosted_mode_requires_api_key() {
        let mut config = AppConfig::default();
        config.llm.hosted.api_key_env = "OUTLINER_TEST_UNSET_HOSTED_KEY_987".into();

        let err = AnyClient::from_config(&config).err().expect("missing key");
        assert!(err.to_string().contains("OUTLINER_TEST_UNSET_HOSTED_KEY_987"));
    }
}
